//! Normalises coordinator output into the wire contract.
//!
//! Grounded on `event_bus::bus::EventBus` + `event_bus::hub::EventHub`
//! (tokio broadcast + pluggable sinks): `EventStreamWriter` wraps one
//! `EventStream` subscription and translates each internal [`Event`] into
//! zero or more [`StreamFrame`]s, the way a sink would, except its output is
//! a typed stream rather than a side effect.

pub mod frame;

pub use frame::StreamFrame;

use std::time::{Duration, Instant};

use tokio::sync::broadcast::error::RecvError;

use crate::event_bus::{Event, EventStream, LLMStreamingEventScope, CHECKPOINT_SCOPE, STREAM_END_SCOPE};
use crate::model::timeline::AgentEvent;
use crate::model::Checkpoint;

/// Per-session, single-writer translator from the internal event bus to the
/// wire contract. Writes after [`Self::close`] are silently dropped, as the
/// concurrency model requires.
pub struct EventStreamWriter {
    stream: EventStream,
    heartbeat_interval: Duration,
    last_activity: Instant,
    closed: bool,
}

impl EventStreamWriter {
    pub fn new(stream: EventStream, heartbeat_interval: Duration) -> Self {
        Self {
            stream,
            heartbeat_interval,
            last_activity: Instant::now(),
            closed: false,
        }
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Pulls the next wire frame, or `None` once the session's bus has
    /// closed. Emits a transient heartbeat if nothing structured arrives
    /// within `heartbeat_interval`.
    pub async fn next_frame(&mut self) -> Option<StreamFrame> {
        if self.closed {
            return None;
        }
        loop {
            match tokio::time::timeout(self.heartbeat_interval, self.stream.recv()).await {
                Ok(Ok(event)) => {
                    self.last_activity = Instant::now();
                    if let Some(frame) = translate(event) {
                        return Some(frame);
                    }
                    continue;
                }
                Ok(Err(RecvError::Lagged(_))) => continue,
                Ok(Err(RecvError::Closed)) => {
                    self.closed = true;
                    return None;
                }
                Err(_elapsed) => {
                    self.last_activity = Instant::now();
                    return Some(StreamFrame::heartbeat());
                }
            }
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

fn translate(event: Event) -> Option<StreamFrame> {
    match event {
        Event::LLM(llm) => match llm.scope {
            LLMStreamingEventScope::Chunk | LLMStreamingEventScope::Streaming => Some(StreamFrame::TextDelta {
                id: llm.stream_id,
                delta: llm.chunk,
            }),
            LLMStreamingEventScope::Final => None,
            LLMStreamingEventScope::Error => Some(StreamFrame::Notification {
                message: llm.chunk,
                level: "error".into(),
            }),
        },
        Event::Diagnostic(diag) => Some(StreamFrame::LogLine {
            text: format!("[{}] {}", diag.scope, diag.message),
            icon: None,
        }),
        Event::Stage(stage_event) if stage_event.scope == STREAM_END_SCOPE => Some(lifecycle_frame(stage_event.message)),
        Event::Stage(stage_event) if stage_event.scope == CHECKPOINT_SCOPE => serde_json::from_str::<Checkpoint>(&stage_event.message)
            .ok()
            .map(|checkpoint| StreamFrame::Checkpoint { checkpoint }),
        Event::Stage(stage_event) => match serde_json::from_str::<AgentEvent>(&stage_event.message) {
            Ok(agent_event) => Some(agent_event_frame(agent_event)),
            Err(_) => Some(StreamFrame::LogLine {
                text: stage_event.message,
                icon: None,
            }),
        },
    }
}

/// `message` is one of `complete`, `aborted`, or `error:<details>` — see
/// `coordinator::Coordinator::run`, the only emitter of `STREAM_END_SCOPE`.
fn lifecycle_frame(message: String) -> StreamFrame {
    if message == "aborted" {
        StreamFrame::agent_paused("user requested stop")
    } else if let Some(error) = message.strip_prefix("error:") {
        StreamFrame::session_error(error.to_string(), Some(true))
    } else {
        StreamFrame::session_complete()
    }
}

/// `StageContext::emit_agent_event` is called at `start()` (no duration
/// yet) and again after `finish()` (duration set) by every stage executor;
/// there is no current producer of the `update` variant, so that branch is
/// unreachable with today's stage executors but kept for a future
/// partial-progress emitter.
fn agent_event_frame(event: AgentEvent) -> StreamFrame {
    match event.duration_ms {
        Some(duration_ms) => StreamFrame::AgentEventComplete {
            id: event.id,
            status: event.status,
            duration_ms,
            meta: event.meta,
        },
        None => StreamFrame::AgentEvent {
            id: event.id,
            stage: event.stage,
            status: event.status,
            title_en: event.title_en,
            title_zh: event.title_zh,
            iteration: event.iteration,
            total_iterations: event.total_iterations,
            meta: event.meta,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::EventHub;
    use crate::model::timeline::Stage as StageName;

    #[tokio::test]
    async fn translates_agent_event_start_then_complete() {
        let hub = EventHub::new(16);
        let emitter = hub.emitter();
        let mut writer = EventStreamWriter::new(hub.subscribe(), Duration::from_secs(30));

        let event = AgentEvent::start(StageName::Planning, "Planning research", "规划研究");
        crate::event_bus::EventEmitter::emit(
            &emitter,
            Event::stage_message_with_meta("s1", "planning", 0, event.id.clone(), serde_json::to_string(&event).unwrap()),
        )
        .unwrap();

        let completed = event.complete(crate::model::timeline::AgentEventStatus::Success, 120);
        crate::event_bus::EventEmitter::emit(
            &emitter,
            Event::stage_message_with_meta("s1", "planning", 0, completed.id.clone(), serde_json::to_string(&completed).unwrap()),
        )
        .unwrap();

        let first = writer.next_frame().await.unwrap();
        assert!(matches!(first, StreamFrame::AgentEvent { .. }));
        let second = writer.next_frame().await.unwrap();
        assert!(matches!(second, StreamFrame::AgentEventComplete { duration_ms: 120, .. }));
    }

    #[tokio::test]
    async fn emits_heartbeat_when_idle() {
        let hub = EventHub::new(16);
        let mut writer = EventStreamWriter::new(hub.subscribe(), Duration::from_millis(20));
        let frame = writer.next_frame().await.unwrap();
        assert!(frame.is_transient());
    }
}
