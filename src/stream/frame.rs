//! The wire-level event contract a client actually consumes.
//!
//! Generalises the teacher's internal `event_bus::event::Event`
//! (`Stage`/`Diagnostic`/`LLM`) into the tagged set of frames. `EventStreamWriter`
//! is the only component that produces these.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::timeline::{AgentEventStatus, Stage};
use crate::model::Checkpoint;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum StreamFrame {
    #[serde(rename = "data-notification")]
    Notification { message: String, level: String },

    #[serde(rename = "data-agent-event")]
    AgentEvent {
        id: String,
        stage: Stage,
        status: AgentEventStatus,
        #[serde(rename = "titleEn")]
        title_en: String,
        #[serde(rename = "titleZh")]
        title_zh: String,
        iteration: Option<u32>,
        #[serde(rename = "totalIterations")]
        total_iterations: Option<u32>,
        #[serde(default)]
        meta: FxHashMap<String, Value>,
    },

    #[serde(rename = "data-agent-event-update")]
    AgentEventUpdate {
        id: String,
        stage: Stage,
        status: AgentEventStatus,
        #[serde(rename = "titleEn")]
        title_en: String,
        #[serde(rename = "titleZh")]
        title_zh: String,
        iteration: Option<u32>,
        #[serde(rename = "totalIterations")]
        total_iterations: Option<u32>,
        #[serde(default)]
        meta: FxHashMap<String, Value>,
    },

    #[serde(rename = "data-agent-event-complete")]
    AgentEventComplete {
        id: String,
        status: AgentEventStatus,
        #[serde(rename = "duration")]
        duration_ms: u64,
        #[serde(default)]
        meta: FxHashMap<String, Value>,
    },

    #[serde(rename = "data-plan")]
    Plan { card_id: String, payload: Value },

    #[serde(rename = "data-paper-list")]
    PaperList { card_id: String, payload: Value },

    #[serde(rename = "data-quality")]
    Quality { card_id: String, payload: Value },

    #[serde(rename = "data-document")]
    Document { card_id: String, payload: Value },

    #[serde(rename = "text-delta")]
    TextDelta { id: String, delta: String },

    #[serde(rename = "data-checkpoint")]
    Checkpoint { checkpoint: Checkpoint },

    #[serde(rename = "data-log-line")]
    LogLine { text: String, icon: Option<String> },

    #[serde(rename = "data-agent-paused")]
    AgentPaused { reason: String },

    #[serde(rename = "data-session-complete")]
    SessionComplete { timestamp: DateTime<Utc> },

    #[serde(rename = "data-session-error")]
    SessionError { error: String, recoverable: Option<bool> },
}

impl StreamFrame {
    /// Frame discriminators are never per-frame IDs themselves; structured
    /// frames that share an id (`X`/`X-update`/`X-complete`) are matched by
    /// the `id` field on the variants that carry one.
    pub fn id(&self) -> Option<&str> {
        match self {
            StreamFrame::AgentEvent { id, .. } | StreamFrame::AgentEventUpdate { id, .. } | StreamFrame::AgentEventComplete { id, .. } => Some(id),
            StreamFrame::TextDelta { id, .. } => Some(id),
            StreamFrame::Plan { card_id, .. } | StreamFrame::PaperList { card_id, .. } | StreamFrame::Quality { card_id, .. } | StreamFrame::Document { card_id, .. } => Some(card_id),
            _ => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StreamFrame::Notification { .. })
    }

    /// A terminal frame means the session's stream has nothing more to say;
    /// the HTTP handler closes the response after forwarding it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamFrame::SessionComplete { .. } | StreamFrame::SessionError { .. } | StreamFrame::AgentPaused { .. })
    }

    pub fn session_complete() -> Self {
        StreamFrame::SessionComplete { timestamp: Utc::now() }
    }

    pub fn session_error(error: impl Into<String>, recoverable: Option<bool>) -> Self {
        StreamFrame::SessionError {
            error: error.into(),
            recoverable,
        }
    }

    pub fn agent_paused(reason: impl Into<String>) -> Self {
        StreamFrame::AgentPaused { reason: reason.into() }
    }

    pub fn heartbeat() -> Self {
        StreamFrame::Notification {
            message: "heartbeat".into(),
            level: "heartbeat".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_the_wire_discriminator() {
        let frame = StreamFrame::TextDelta { id: "s1".into(), delta: "hello".into() };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "text-delta");
        assert_eq!(value["delta"], "hello");
    }

    #[test]
    fn heartbeat_is_transient() {
        assert!(StreamFrame::heartbeat().is_transient());
        assert!(!StreamFrame::session_complete().is_transient());
    }
}
