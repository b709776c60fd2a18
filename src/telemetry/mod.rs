//! Plain-text rendering for the event stream and error ladders, used by the
//! stdout sink and by `pretty_print` for operator-facing diagnostics.

use crate::error::ErrorEvent;
use crate::event_bus::Event;

pub const CONTEXT_COLOR: &str = "\x1b[32m";
pub const LINE_COLOR: &str = "\x1b[35m";
pub const RESET_COLOR: &str = "\x1b[0m";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatterMode {
    Auto,
    Colored,
    Plain,
}

#[derive(Clone, Debug, Default)]
pub struct EventRender {
    pub context: Option<String>,
    pub lines: Vec<String>,
}

impl EventRender {
    pub fn join_lines(&self) -> String {
        self.lines.join("")
    }
}

pub trait TelemetryFormatter: Send + Sync {
    fn render_event(&self, event: &Event) -> EventRender;
    fn render_errors(&self, errors: &[ErrorEvent]) -> Vec<EventRender>;
}

pub struct PlainFormatter {
    colored: bool,
}

impl PlainFormatter {
    pub fn new() -> Self {
        Self::with_mode(FormatterMode::Auto)
    }

    pub fn with_mode(mode: FormatterMode) -> Self {
        let colored = match mode {
            FormatterMode::Colored => true,
            FormatterMode::Plain => false,
            FormatterMode::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        };
        Self { colored }
    }

    fn line_color(&self) -> &'static str {
        if self.colored { LINE_COLOR } else { "" }
    }

    fn context_color(&self) -> &'static str {
        if self.colored { CONTEXT_COLOR } else { "" }
    }

    fn reset(&self) -> &'static str {
        if self.colored { RESET_COLOR } else { "" }
    }
}

impl Default for PlainFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn format_error_chain(formatter: &PlainFormatter, error: &crate::error::LadderError, indent: usize) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(cause) = &error.cause {
        let indent_str = "  ".repeat(indent);
        lines.push(format!(
            "{}{indent_str}cause: {}{}\n",
            formatter.line_color(),
            cause.message,
            formatter.reset()
        ));
        lines.extend(format_error_chain(formatter, cause, indent + 1));
    }
    lines
}

impl TelemetryFormatter for PlainFormatter {
    fn render_event(&self, event: &Event) -> EventRender {
        let line = format!("{}{}{}\n", self.line_color(), event, self.reset());
        EventRender {
            context: event.scope_label().map(str::to_string),
            lines: vec![line],
        }
    }

    fn render_errors(&self, errors: &[ErrorEvent]) -> Vec<EventRender> {
        errors
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let mut lines = Vec::new();
                let scope_str = format!("{}{:?}{}", self.context_color(), e.scope, self.reset());
                lines.push(format!("[{i}] {} | {scope_str}\n", e.when));
                lines.push(format!(
                    "{}  error: {}{}\n",
                    self.line_color(),
                    e.error.message,
                    self.reset()
                ));
                lines.extend(format_error_chain(self, &e.error, 1));
                if !e.tags.is_empty() {
                    lines.push(format!(
                        "{}  tags: {:?}{}\n",
                        self.line_color(),
                        e.tags,
                        self.reset()
                    ));
                }
                if !e.context.is_null() {
                    lines.push(format!(
                        "{}  context: {}{}\n",
                        self.line_color(),
                        e.context,
                        self.reset()
                    ));
                }
                EventRender {
                    context: Some(format!("{:?}", e.scope)),
                    lines,
                }
            })
            .collect()
    }
}

pub fn pretty_print_with_mode(events: &[ErrorEvent], mode: FormatterMode) -> String {
    let formatter = PlainFormatter::with_mode(mode);
    let renders = formatter.render_errors(events);
    let mut out = String::new();
    for (idx, render) in renders.into_iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        for line in render.lines {
            out.push_str(&line);
        }
    }
    out
}

pub fn pretty_print(events: &[ErrorEvent]) -> String {
    pretty_print_with_mode(events, FormatterMode::Auto)
}
