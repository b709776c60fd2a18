//! The fixed pipeline state machine: the only component with full knowledge
//! of stage order.
//!
//! Grounded on the teacher's `runtimes::runner::AppRunner::run_step`'s
//! `StepResult::{Completed, Paused(PausedReport)}` pattern: our per-stage
//! `Stage::run` call plays the `Completed` role every time it returns, and
//! a checkpoint wait plays the `Paused` role — except resolution comes from
//! a client via [`crate::session::SessionManager`] rather than from a
//! scheduler option. Unlike the teacher's graph runner, stage order here is
//! fixed at compile time, not discovered from edges, so the coordinator is a
//! plain async function walking a known sequence rather than a scheduler.

use std::sync::Arc;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::event_bus::{Event, EventEmitter, CHECKPOINT_SCOPE, STREAM_END_SCOPE};
use crate::memory::ResearchMemory;
use crate::model::quality::QualityDecision;
use crate::model::{Checkpoint, CheckpointAction, CheckpointKind, CheckpointOption, CheckpointVariant};
use crate::model::timeline::Stage as StageName;
use crate::session::{CheckpointWait, SessionError, SessionManager};
use crate::stages::{critic, Analyzer, Critic, Planner, Searcher, Stage, StageContext, StageError, Validator, Writer};

#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub max_search_rounds: u32,
    pub max_iterations: u32,
    pub min_papers_required: u32,
    pub enable_multi_source: bool,
    pub enable_citation_validation: bool,
    pub enable_context_compression: bool,
    pub checkpoint_timeout: Duration,
}

#[derive(Debug, Error, Diagnostic)]
pub enum CoordinatorError {
    #[error(transparent)]
    #[diagnostic(code(citeweave::coordinator::stage))]
    Stage(#[from] StageError),

    #[error(transparent)]
    #[diagnostic(code(citeweave::coordinator::session))]
    Session(#[from] SessionError),

    #[error("session aborted")]
    #[diagnostic(code(citeweave::coordinator::aborted))]
    Aborted,
}

/// Drives one research session end to end. Holds the stage executors and
/// the config that decides iteration/round caps and which optional stages
/// run; does not hold memory or session state, both passed per call so one
/// `Coordinator` can drive many concurrent sessions.
pub struct Coordinator {
    planner: Planner,
    searcher: Searcher,
    analyzer: Analyzer,
    writer: Writer,
    critic: Critic,
    validator: Validator,
    config: CoordinatorConfig,
    sessions: Arc<SessionManager>,
}

impl Coordinator {
    pub fn new(
        planner: Planner,
        searcher: Searcher,
        analyzer: Analyzer,
        writer: Writer,
        critic: Critic,
        validator: Validator,
        config: CoordinatorConfig,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            planner,
            searcher,
            analyzer,
            writer,
            critic,
            validator,
            config,
            sessions,
        }
    }

    fn ctx(&self, session_id: &str, stage: StageName, step: u64, iteration: u32, emitter: &Arc<dyn EventEmitter>) -> StageContext {
        StageContext {
            session_id: session_id.to_string(),
            stage,
            step,
            iteration,
            event_emitter: emitter.clone(),
        }
    }

    fn check_abort(&self, session_id: &str) -> Result<(), CoordinatorError> {
        if self.sessions.is_aborted(session_id) {
            Err(CoordinatorError::Aborted)
        } else {
            Ok(())
        }
    }

    /// Registers a checkpoint and blocks until it resolves, times out
    /// (implicit approve), or the session is aborted.
    async fn await_checkpoint(&self, session_id: &str, checkpoint: Checkpoint, emitter: &Arc<dyn EventEmitter>) -> Result<CheckpointAction, CoordinatorError> {
        let payload = serde_json::to_string(&checkpoint).unwrap_or_default();
        let _ = emitter.emit(Event::stage_message(session_id, CHECKPOINT_SCOPE, payload));
        let rx = self.sessions.set_checkpoint(session_id, checkpoint.clone())?;
        let outcome = self.sessions.wait_for_checkpoint(session_id, rx, self.config.checkpoint_timeout).await?;
        self.sessions.clear_checkpoint(session_id)?;
        match outcome {
            CheckpointWait::Resolved(resolution) => Ok(resolution.action),
            CheckpointWait::TimedOut => {
                warn!(session_id, checkpoint = %checkpoint.id, "checkpoint timed out, treating as implicit approve");
                Ok(CheckpointAction::Approve)
            }
            CheckpointWait::Aborted => Err(CoordinatorError::Aborted),
        }
    }

    /// Drives the pipeline and reports the outcome on the event bus as a
    /// `STREAM_END_SCOPE` marker so `EventStreamWriter` can translate it into
    /// the terminal wire frame (`data-session-complete`/`-error`/`-paused`)
    /// and the HTTP handler knows to close the response, mirroring the
    /// teacher's `scope_label() == Some(STREAM_END_SCOPE)` loop-break idiom.
    #[instrument(skip(self, memory, emitter), fields(session_id))]
    pub async fn run(&self, session_id: &str, memory: &mut ResearchMemory, emitter: Arc<dyn EventEmitter>) -> Result<(), CoordinatorError> {
        let outcome = self.run_pipeline(session_id, memory, emitter.clone()).await;
        let message = match &outcome {
            Ok(()) => "complete".to_string(),
            Err(CoordinatorError::Aborted) => "aborted".to_string(),
            Err(other) => {
                let _ = self.sessions.set_error(session_id, other.to_string());
                format!("error:{other}")
            }
        };
        let _ = emitter.emit(Event::stage_message(session_id, STREAM_END_SCOPE, message));
        outcome
    }

    async fn run_pipeline(&self, session_id: &str, memory: &mut ResearchMemory, emitter: Arc<dyn EventEmitter>) -> Result<(), CoordinatorError> {
        self.sessions.start(session_id)?;
        let mut step = 0u64;

        // --- Planning ---
        self.check_abort(session_id)?;
        self.planner.run(memory, self.ctx(session_id, StageName::Planning, step, memory.iteration(), &emitter)).await?;
        step += 1;

        let plan_checkpoint = Checkpoint::new(
            CheckpointKind::PlanApproval,
            "Approve research plan",
            "Review the proposed plan before search begins.",
            "plan-card",
            vec![
                CheckpointOption { id: "approve".into(), label: "Approve".into(), variant: CheckpointVariant::Primary, action: CheckpointAction::Approve },
                CheckpointOption { id: "edit".into(), label: "Edit".into(), variant: CheckpointVariant::Secondary, action: CheckpointAction::Edit },
            ],
        );
        match self.await_checkpoint(session_id, plan_checkpoint, &emitter).await? {
            CheckpointAction::Edit => {
                let query = memory.initial_query.clone();
                let revised = self.planner.plan(&query, Some("incorporate the client's requested edits")).await?;
                memory.set_plan(revised);
            }
            _ => {}
        }

        // --- Searching / Analyzing ---
        if self.config.enable_multi_source {
            self.check_abort(session_id)?;
            self.searcher.run(memory, self.ctx(session_id, StageName::Searching, step, memory.iteration(), &emitter)).await?;
            step += 1;
        }
        self.check_abort(session_id)?;
        self.analyzer.run(memory, self.ctx(session_id, StageName::Analyzing, step, memory.iteration(), &emitter)).await?;
        step += 1;

        if (memory.all_papers().count() as u32) < self.config.min_papers_required {
            warn!(session_id, found = memory.all_papers().count(), required = self.config.min_papers_required, "fewer papers than required; proceeding with what was found");
        }

        // --- Writing / Reviewing loop ---
        let mut forced_extra_pass = false;
        loop {
            self.check_abort(session_id)?;
            memory.increment_iteration();
            self.writer.run(memory, self.ctx(session_id, StageName::Writing, step, memory.iteration(), &emitter)).await?;
            step += 1;

            self.check_abort(session_id)?;
            self.critic.run(memory, self.ctx(session_id, StageName::Reviewing, step, memory.iteration(), &emitter)).await?;
            step += 1;

            let metrics = memory.get_latest().and_then(|v| v.metrics.clone()).unwrap_or_default();
            let decision = critic::decide(self.critic.quality_gate(), &metrics, memory.iteration());

            match decision {
                QualityDecision::Pass => break,
                QualityDecision::Iterate if memory.iteration() < self.config.max_iterations => continue,
                QualityDecision::Iterate | QualityDecision::Fail => {
                    if forced_extra_pass {
                        break;
                    }
                    let checkpoint = Checkpoint::new(
                        CheckpointKind::QualityDecision,
                        "Report quality below target",
                        format!("Score {:.1} did not reach the quality gate after {} iterations.", metrics.overall_score, memory.iteration()),
                        "quality-card",
                        vec![
                            CheckpointOption { id: "approve".into(), label: "Accept as-is".into(), variant: CheckpointVariant::Primary, action: CheckpointAction::Approve },
                            CheckpointOption { id: "iterate".into(), label: "One more pass".into(), variant: CheckpointVariant::Secondary, action: CheckpointAction::Iterate },
                        ],
                    );
                    match self.await_checkpoint(session_id, checkpoint, &emitter).await? {
                        CheckpointAction::Iterate => {
                            forced_extra_pass = true;
                            continue;
                        }
                        _ => break,
                    }
                }
            }
        }

        // --- Validating ---
        if self.config.enable_citation_validation {
            self.check_abort(session_id)?;
            self.validator.run(memory, self.ctx(session_id, StageName::Validating, step, memory.iteration(), &emitter)).await?;
            step += 1;
        }

        // --- Finalising ---
        let report_checkpoint = Checkpoint::new(
            CheckpointKind::ReportReview,
            "Final report ready",
            "The report passed the quality gate and citation validation.",
            "report-card",
            vec![CheckpointOption { id: "approve".into(), label: "Approve".into(), variant: CheckpointVariant::Primary, action: CheckpointAction::Approve }],
        );
        self.await_checkpoint(session_id, report_checkpoint, &emitter).await?;

        info!(session_id, steps = step, "session complete");
        self.sessions.complete(session_id)?;
        Ok(())
    }
}
