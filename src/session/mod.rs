//! Session lifecycle and checkpoint rendezvous.
//!
//! Grounded on `runtimes::checkpointer::InMemoryCheckpointer`'s
//! `RwLock<FxHashMap<..>>` shape, generalised from durable step-state storage
//! to the lighter-weight "one live session, one pending checkpoint slot"
//! model this orchestrator needs. The checkpoint rendezvous itself — a
//! one-shot slot fillable at most once, read with a deadline, observable to
//! an abort signal — has no teacher counterpart and is built fresh on
//! `tokio::sync::oneshot` + `tokio::time::sleep` + `tokio::sync::Notify`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::sync::{oneshot, Notify};

use crate::event_bus::{EventHub, HubEmitter};
use crate::model::{Checkpoint, CheckpointResolution};

/// Per-session broadcast capacity; generous enough that a slow SSE client
/// lags before it drops anything during a normal research run.
const SESSION_EVENT_CAPACITY: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Created,
    Running,
    AwaitingCheckpoint,
    Completed,
    Error,
    Aborted,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Error | SessionStatus::Aborted)
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("session not found: {0}")]
    #[diagnostic(code(citeweave::session::not_found))]
    NotFound(String),

    #[error("no checkpoint is pending for session {0}")]
    #[diagnostic(code(citeweave::session::no_pending_checkpoint))]
    NoPendingCheckpoint(String),

    #[error("checkpoint id mismatch: expected {expected}, got {got}")]
    #[diagnostic(code(citeweave::session::checkpoint_mismatch))]
    CheckpointMismatch { expected: String, got: String },
}

use miette::Diagnostic;
use thiserror::Error;

/// Outcome of a checkpoint wait.
#[derive(Debug)]
pub enum CheckpointWait {
    Resolved(CheckpointResolution),
    TimedOut,
    Aborted,
}

struct PendingCheckpoint {
    checkpoint: Checkpoint,
    sender: Option<oneshot::Sender<CheckpointResolution>>,
}

struct SessionInner {
    status: SessionStatus,
    query: String,
    error_message: Option<String>,
    pending: Option<PendingCheckpoint>,
    created_at: Instant,
    terminal_at: Option<Instant>,
}

struct SessionHandle {
    inner: Mutex<SessionInner>,
    abort: Notify,
    /// Isolated per-session bus: broadcast is fan-out-to-all-subscribers, so
    /// sharing one hub across sessions would leak every session's events to
    /// every other session's stream.
    hub: Arc<EventHub>,
}

/// Owns every live session, keyed by id, under a single `RwLock` with
/// per-session interior locking (matching the teacher's checkpointer shape).
pub struct SessionManager {
    sessions: RwLock<FxHashMap<String, Arc<SessionHandle>>>,
    remove_after: Duration,
    max_live_sessions: usize,
}

impl SessionManager {
    pub fn new(remove_after: Duration, max_live_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(FxHashMap::default()),
            remove_after,
            max_live_sessions,
        }
    }

    fn handle(&self, id: &str) -> Result<Arc<SessionHandle>, SessionError> {
        self.sessions.read().get(id).cloned().ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Registers a fresh session, evicting the oldest live one first if this
    /// would exceed `max_live_sessions`.
    pub fn create(&self, id: impl Into<String>, query: impl Into<String>) {
        let id = id.into();
        self.evict_if_full();
        let handle = Arc::new(SessionHandle {
            inner: Mutex::new(SessionInner {
                status: SessionStatus::Created,
                query: query.into(),
                error_message: None,
                pending: None,
                created_at: Instant::now(),
                terminal_at: None,
            }),
            abort: Notify::new(),
            hub: EventHub::new(SESSION_EVENT_CAPACITY),
        });
        self.sessions.write().insert(id, handle);
    }

    /// Hands back the emitter stage executors and the coordinator write
    /// progress events through for this session.
    pub fn emitter(&self, id: &str) -> Result<HubEmitter, SessionError> {
        Ok(self.handle(id)?.hub.emitter())
    }

    /// Subscribes a fresh reader to this session's event stream, for
    /// [`crate::stream::EventStreamWriter`].
    pub fn subscribe(&self, id: &str) -> Result<crate::event_bus::EventStream, SessionError> {
        Ok(self.handle(id)?.hub.subscribe())
    }

    fn evict_if_full(&self) {
        let oldest = {
            let sessions = self.sessions.read();
            if sessions.len() < self.max_live_sessions {
                return;
            }
            sessions
                .iter()
                .min_by_key(|(_, h)| h.inner.lock().created_at)
                .map(|(id, _)| id.clone())
        };
        if let Some(id) = oldest {
            self.abort(&id).ok();
            self.sessions.write().remove(&id);
        }
    }

    pub fn start(&self, id: &str) -> Result<(), SessionError> {
        let handle = self.handle(id)?;
        handle.inner.lock().status = SessionStatus::Running;
        Ok(())
    }

    pub fn complete(&self, id: &str) -> Result<(), SessionError> {
        let handle = self.handle(id)?;
        let mut inner = handle.inner.lock();
        inner.status = SessionStatus::Completed;
        inner.terminal_at = Some(Instant::now());
        Ok(())
    }

    pub fn set_error(&self, id: &str, message: impl Into<String>) -> Result<(), SessionError> {
        let handle = self.handle(id)?;
        let mut inner = handle.inner.lock();
        inner.status = SessionStatus::Error;
        inner.error_message = Some(message.into());
        inner.terminal_at = Some(Instant::now());
        Ok(())
    }

    pub fn abort(&self, id: &str) -> Result<(), SessionError> {
        let handle = self.handle(id)?;
        {
            let mut inner = handle.inner.lock();
            inner.status = SessionStatus::Aborted;
            inner.terminal_at = Some(Instant::now());
        }
        handle.abort.notify_waiters();
        Ok(())
    }

    pub fn is_aborted(&self, id: &str) -> bool {
        self.handle(id).map(|h| h.inner.lock().status == SessionStatus::Aborted).unwrap_or(true)
    }

    pub fn status(&self, id: &str) -> Result<SessionStatus, SessionError> {
        Ok(self.handle(id)?.inner.lock().status)
    }

    pub fn query(&self, id: &str) -> Result<String, SessionError> {
        Ok(self.handle(id)?.inner.lock().query.clone())
    }

    pub fn remove(&self, id: &str) {
        self.sessions.write().remove(id);
    }

    /// Sweeps sessions that reached a terminal state more than
    /// `remove_after` ago. Call periodically from a background task.
    pub fn sweep_expired(&self) {
        let expired: Vec<String> = self
            .sessions
            .read()
            .iter()
            .filter_map(|(id, h)| {
                let inner = h.inner.lock();
                inner
                    .terminal_at
                    .filter(|at| at.elapsed() >= self.remove_after)
                    .map(|_| id.clone())
            })
            .collect();
        if expired.is_empty() {
            return;
        }
        let mut sessions = self.sessions.write();
        for id in expired {
            sessions.remove(&id);
        }
    }

    /// Attaches `checkpoint`, transitions to `AwaitingCheckpoint`, and
    /// lazily opens a one-shot slot for the resolution.
    pub fn set_checkpoint(&self, id: &str, checkpoint: Checkpoint) -> Result<oneshot::Receiver<CheckpointResolution>, SessionError> {
        let handle = self.handle(id)?;
        let (tx, rx) = oneshot::channel();
        let mut inner = handle.inner.lock();
        inner.status = SessionStatus::AwaitingCheckpoint;
        inner.pending = Some(PendingCheckpoint {
            checkpoint,
            sender: Some(tx),
        });
        Ok(rx)
    }

    /// Races the checkpoint resolution against `timeout` and the session's
    /// abort signal.
    pub async fn wait_for_checkpoint(&self, id: &str, receiver: oneshot::Receiver<CheckpointResolution>, timeout: Duration) -> Result<CheckpointWait, SessionError> {
        let handle = self.handle(id)?;
        tokio::select! {
            biased;
            _ = handle.abort.notified() => Ok(CheckpointWait::Aborted),
            resolution = receiver => match resolution {
                Ok(resolution) => Ok(CheckpointWait::Resolved(resolution)),
                Err(_) => Ok(CheckpointWait::TimedOut),
            },
            _ = tokio::time::sleep(timeout) => Ok(CheckpointWait::TimedOut),
        }
    }

    /// Fills the pending slot if `checkpoint_id` matches; idempotent — a
    /// second call for an already-resolved checkpoint is a no-op.
    pub fn resolve_checkpoint(&self, id: &str, checkpoint_id: &str, resolution: CheckpointResolution) -> Result<(), SessionError> {
        let handle = self.handle(id)?;
        let mut inner = handle.inner.lock();
        let Some(pending) = inner.pending.as_mut() else {
            return Err(SessionError::NoPendingCheckpoint(id.to_string()));
        };
        if pending.checkpoint.id != checkpoint_id {
            return Err(SessionError::CheckpointMismatch {
                expected: pending.checkpoint.id.clone(),
                got: checkpoint_id.to_string(),
            });
        }
        if let Some(sender) = pending.sender.take() {
            let _ = sender.send(resolution);
        }
        Ok(())
    }

    pub fn clear_checkpoint(&self, id: &str) -> Result<(), SessionError> {
        let handle = self.handle(id)?;
        handle.inner.lock().pending = None;
        Ok(())
    }

    pub fn pending_checkpoint(&self, id: &str) -> Result<Option<Checkpoint>, SessionError> {
        Ok(self.handle(id)?.inner.lock().pending.as_ref().map(|p| p.checkpoint.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CheckpointAction, CheckpointKind};

    #[tokio::test]
    async fn checkpoint_resolves_before_timeout() {
        let manager = SessionManager::new(Duration::from_secs(60), 100);
        manager.create("s1", "query");
        let checkpoint = Checkpoint::new(CheckpointKind::PlanApproval, "Approve plan", "desc", "card1", Vec::new());
        let checkpoint_id = checkpoint.id.clone();
        let rx = manager.set_checkpoint("s1", checkpoint).unwrap();

        manager
            .resolve_checkpoint("s1", &checkpoint_id, CheckpointResolution { action: CheckpointAction::Approve, data: None })
            .unwrap();

        let outcome = manager.wait_for_checkpoint("s1", rx, Duration::from_secs(5)).await.unwrap();
        assert!(matches!(outcome, CheckpointWait::Resolved(res) if res.action == CheckpointAction::Approve));
    }

    #[tokio::test]
    async fn checkpoint_wait_is_aborted_on_session_abort() {
        let manager = SessionManager::new(Duration::from_secs(60), 100);
        manager.create("s1", "query");
        let checkpoint = Checkpoint::new(CheckpointKind::PlanApproval, "Approve plan", "desc", "card1", Vec::new());
        let rx = manager.set_checkpoint("s1", checkpoint).unwrap();
        manager.abort("s1").unwrap();
        let outcome = manager.wait_for_checkpoint("s1", rx, Duration::from_secs(5)).await.unwrap();
        assert!(matches!(outcome, CheckpointWait::Aborted));
    }

    #[test]
    fn eviction_removes_oldest_when_full() {
        let manager = SessionManager::new(Duration::from_secs(60), 1);
        manager.create("s1", "first");
        manager.create("s2", "second");
        assert!(manager.status("s1").is_err());
        assert!(manager.status("s2").is_ok());
    }
}
