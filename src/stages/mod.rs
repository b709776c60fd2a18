//! Stage executors: Planner, Searcher, Analyzer, Writer, Critic, Validator.
//!
//! `Stage` mirrors the teacher's `node::Node` trait 1:1 — same shape
//! (`run(snapshot_equivalent, ctx) -> Result<Partial, Error>`), generalised
//! from a graph-runner node to a fixed pipeline stage.

pub mod analyzer;
pub mod critic;
pub mod planner;
pub mod searcher;
pub mod validator;
pub mod writer;

pub use analyzer::Analyzer;
pub use critic::Critic;
pub use planner::Planner;
pub use searcher::Searcher;
pub use validator::Validator;
pub use writer::Writer;

use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::error::CoreError;
use crate::event_bus::{Event, EventEmitter, LLMStreamingEvent};
use crate::memory::ResearchMemory;
use crate::model::timeline::{AgentEvent, AgentEventStatus, Stage as StageName};

#[derive(Debug, Error, Diagnostic)]
pub enum StageError {
    #[error("missing expected input: {what}")]
    #[diagnostic(code(citeweave::stage::missing_input))]
    MissingInput { what: &'static str },

    #[error(transparent)]
    #[diagnostic(code(citeweave::stage::core))]
    Core(#[from] CoreError),
}

/// Context a stage executor gets for one invocation: identity, iteration
/// bookkeeping, and the event emitter, mirroring `node::NodeContext`.
#[derive(Clone)]
pub struct StageContext {
    pub session_id: String,
    pub stage: StageName,
    pub step: u64,
    pub iteration: u32,
    pub event_emitter: Arc<dyn EventEmitter>,
}

impl StageContext {
    pub fn emit_stage(&self, scope: impl Into<String>, message: impl Into<String>) {
        let _ = self.event_emitter.emit(Event::stage_message_with_meta(
            self.session_id.clone(),
            format!("{:?}", self.stage).to_lowercase(),
            self.step,
            scope,
            message,
        ));
    }

    pub fn start_event(&self, title_en: impl Into<String>, title_zh: impl Into<String>) -> AgentEvent {
        AgentEvent::start(self.stage, title_en, title_zh).with_iteration(self.iteration, self.iteration)
    }

    pub fn emit_agent_event(&self, event: &AgentEvent) {
        let payload = serde_json::to_string(event).unwrap_or_default();
        self.emit_stage(event.id.clone(), payload);
    }

    /// Emits one chunk of a text-delta run; `stream_id` groups the whole run
    /// on the wire (`EventStreamWriter` folds these into `text-delta` frames).
    pub fn emit_text_delta(&self, stream_id: &str, chunk: impl Into<String>) {
        let _ = self.event_emitter.emit(Event::LLM(LLMStreamingEvent::chunk_event(
            self.session_id.clone(),
            format!("{:?}", self.stage).to_lowercase(),
            stream_id,
            chunk,
        )));
    }

    pub fn emit_text_final(&self, stream_id: &str) {
        let _ = self.event_emitter.emit(Event::LLM(LLMStreamingEvent::final_event(
            self.session_id.clone(),
            format!("{:?}", self.stage).to_lowercase(),
            stream_id,
        )));
    }
}

/// Outcome a stage returns: textual/structured deltas the Coordinator folds
/// back into an `AgentEvent` timeline and, where relevant, into memory
/// directly (memory mutation happens inside `run` via `&mut`).
#[derive(Debug, Default)]
pub struct StagePartial {
    pub summary: String,
    pub events: Vec<AgentEvent>,
}

#[async_trait]
pub trait Stage: Send + Sync {
    async fn run(&self, memory: &mut ResearchMemory, ctx: StageContext) -> Result<StagePartial, StageError>;
}

pub(crate) fn finish(event: AgentEvent, started: std::time::Instant) -> AgentEvent {
    event.complete(AgentEventStatus::Success, started.elapsed().as_millis() as u64)
}
