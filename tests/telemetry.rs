use citeweave::error::{ErrorEvent, LadderError};
use citeweave::event_bus::Event;
use citeweave::telemetry::{FormatterMode, PlainFormatter, TelemetryFormatter, CONTEXT_COLOR, LINE_COLOR, RESET_COLOR};
use serde_json::json;

#[test]
fn render_event_includes_colors_and_scope_context() {
    let fmt = PlainFormatter::with_mode(FormatterMode::Colored);
    let event = Event::stage_message("s1", "searching", "hello");
    let render = fmt.render_event(&event);

    assert_eq!(render.context.as_deref(), Some("searching"));
    let joined = render.join_lines();
    assert!(joined.contains(LINE_COLOR));
    assert!(joined.contains(RESET_COLOR));
    assert!(joined.contains("hello"));
}

#[test]
fn render_errors_formats_scope_lines_cause_tags_and_context() {
    let fmt = PlainFormatter::with_mode(FormatterMode::Colored);

    let e1 = ErrorEvent::stage("searching", "s1", LadderError::msg("boom").with_cause(LadderError::msg("inner")))
        .with_tag("retryable")
        .with_context(json!({"round": 2}));
    let e2 = ErrorEvent::source("core_api", LadderError::msg("timed out"));

    let renders = fmt.render_errors(&[e1, e2]);
    assert_eq!(renders.len(), 2);

    let r0 = &renders[0];
    assert!(r0.lines[0].contains(CONTEXT_COLOR));
    let body = r0.join_lines();
    assert!(body.contains("error: boom"));
    assert!(body.contains("cause: inner"));
    assert!(body.contains("tags: [\"retryable\"]"));
    assert!(body.contains("context: {\"round\":2}"));

    let r1 = &renders[1];
    let body1 = r1.join_lines();
    assert!(body1.contains("error: timed out"));
    assert!(!body1.contains("cause:"));
    assert!(!body1.contains("tags:"));
}

#[test]
fn plain_mode_excludes_ansi_codes() {
    let fmt = PlainFormatter::with_mode(FormatterMode::Plain);
    let event = Event::stage_message("s1", "writing", "draft ready");
    let output = fmt.render_event(&event).join_lines();

    assert!(!output.contains('\x1b'), "plain mode should not include ANSI escape codes");
    assert!(output.contains("draft ready"));
}

#[test]
fn plain_mode_errors_exclude_ansi_codes_but_keep_content() {
    let fmt = PlainFormatter::with_mode(FormatterMode::Plain);
    let events = vec![ErrorEvent::stage("analyzing", "s1", LadderError::msg("parse error")).with_tag("validation")];
    let output = fmt.render_errors(&events)[0].join_lines();

    assert!(!output.contains('\x1b'));
    assert!(output.contains("parse error"));
    assert!(output.contains("validation"));
}

#[test]
fn nested_error_causes_render_in_plain_mode() {
    let fmt = PlainFormatter::with_mode(FormatterMode::Plain);
    let nested = LadderError::msg("root error").with_cause(LadderError::msg("first cause").with_cause(LadderError::msg("second cause")));
    let events = vec![ErrorEvent::source("semantic_scholar", nested)];
    let output = fmt.render_errors(&events)[0].join_lines();

    assert!(!output.contains('\x1b'));
    assert!(output.contains("root error"));
    assert!(output.contains("first cause"));
    assert!(output.contains("second cause"));
}

#[test]
fn formatter_mode_auto_is_the_default() {
    assert_eq!(FormatterMode::default(), FormatterMode::Auto);

    let fmt = PlainFormatter::new();
    let default_fmt = PlainFormatter::default();
    let event = Event::stage_message("s1", "reviewing", "quality gate passed");

    assert_eq!(fmt.render_event(&event).join_lines(), default_fmt.render_event(&event).join_lines());
}
