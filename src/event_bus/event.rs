//! The event payload broadcast on the internal [`super::hub::EventHub`].
//!
//! This is the *internal* event representation consumed by sinks (stdout,
//! memory, JSON lines); it is distinct from the wire-level
//! [`crate::stream::frame::StreamFrame`] that `EventStreamWriter` derives
//! from it for transport to a client.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const STREAM_END_SCOPE: &str = "__citeweave_stream_end__";

/// Scope marking a [`crate::model::Checkpoint`] JSON payload — distinct from
/// the stage-name scope an `AgentEvent` carries, so translation never has to
/// guess from content alone.
pub const CHECKPOINT_SCOPE: &str = "__citeweave_checkpoint__";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StageEvent {
    pub session_id: Option<String>,
    pub stage: Option<String>,
    pub step: Option<u64>,
    pub scope: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DiagnosticEvent {
    pub scope: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LLMStreamingEventScope {
    Streaming,
    Chunk,
    Final,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LLMStreamingEvent {
    pub session_id: String,
    pub stage: String,
    pub stream_id: String,
    pub chunk: String,
    pub is_final: bool,
    pub scope: LLMStreamingEventScope,
    #[serde(default)]
    pub metadata: FxHashMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl LLMStreamingEvent {
    pub fn chunk_event(session_id: impl Into<String>, stage: impl Into<String>, stream_id: impl Into<String>, chunk: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            stage: stage.into(),
            stream_id: stream_id.into(),
            chunk: chunk.into(),
            is_final: false,
            scope: LLMStreamingEventScope::Chunk,
            metadata: FxHashMap::default(),
            timestamp: Utc::now(),
        }
    }

    pub fn final_event(session_id: impl Into<String>, stage: impl Into<String>, stream_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            stage: stage.into(),
            stream_id: stream_id.into(),
            chunk: String::new(),
            is_final: true,
            scope: LLMStreamingEventScope::Final,
            metadata: FxHashMap::default(),
            timestamp: Utc::now(),
        }
    }

    pub fn error_event(session_id: impl Into<String>, stage: impl Into<String>, stream_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            stage: stage.into(),
            stream_id: stream_id.into(),
            chunk: message.into(),
            is_final: true,
            scope: LLMStreamingEventScope::Error,
            metadata: FxHashMap::default(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Stage(StageEvent),
    Diagnostic(DiagnosticEvent),
    LLM(LLMStreamingEvent),
}

impl Event {
    pub fn stage_message(session_id: impl Into<String>, scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Stage(StageEvent {
            session_id: Some(session_id.into()),
            stage: None,
            step: None,
            scope: scope.into(),
            message: message.into(),
        })
    }

    pub fn stage_message_with_meta(
        session_id: impl Into<String>,
        stage: impl Into<String>,
        step: u64,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Event::Stage(StageEvent {
            session_id: Some(session_id.into()),
            stage: Some(stage.into()),
            step: Some(step),
            scope: scope.into(),
            message: message.into(),
        })
    }

    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Diagnostic(DiagnosticEvent {
            scope: scope.into(),
            message: message.into(),
            timestamp: Utc::now(),
        })
    }

    pub fn scope_label(&self) -> Option<&str> {
        match self {
            Event::Stage(e) => Some(&e.scope),
            Event::Diagnostic(e) => Some(&e.scope),
            Event::LLM(_) => None,
        }
    }

    pub fn to_json_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Stage(e) => write!(f, "[{}] {}", e.scope, e.message),
            Event::Diagnostic(e) => write!(f, "[{}] {}", e.scope, e.message),
            Event::LLM(e) => write!(f, "[llm:{:?}] {}", e.scope, e.chunk),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let event = Event::stage_message("s1", "search", "hit core");
        let json = event.to_json_string().unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
    }

    #[test]
    fn llm_has_no_scope_label() {
        let event = Event::LLM(LLMStreamingEvent::chunk_event("s1", "writing", "stream-1", "hi"));
        assert!(event.scope_label().is_none());
    }
}
