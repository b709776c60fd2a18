//! Human-approval checkpoints.
//!
//! Not to be confused with a durable execution-state snapshot; this
//! `Checkpoint` is a rendezvous point where the coordinator suspends and
//! waits for a client decision (see [`crate::session`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    PlanApproval,
    QualityDecision,
    ReportReview,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointVariant {
    Primary,
    Secondary,
    Destructive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointAction {
    Approve,
    Edit,
    Iterate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckpointOption {
    pub id: String,
    pub label: String,
    pub variant: CheckpointVariant,
    pub action: CheckpointAction,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub kind: CheckpointKind,
    pub title: String,
    pub description: String,
    pub card_id: String,
    pub options: Vec<CheckpointOption>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub action: Option<CheckpointAction>,
    pub data: Option<Value>,
}

impl Checkpoint {
    pub fn new(
        kind: CheckpointKind,
        title: impl Into<String>,
        description: impl Into<String>,
        card_id: impl Into<String>,
        options: Vec<CheckpointOption>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            title: title.into(),
            description: description.into(),
            card_id: card_id.into(),
            options,
            created_at: Utc::now(),
            resolved_at: None,
            action: None,
            data: None,
        }
    }

    pub fn resolve(&mut self, action: CheckpointAction, data: Option<Value>) {
        self.resolved_at = Some(Utc::now());
        self.action = Some(action);
        self.data = data;
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

/// Resolution handed back from [`crate::session::SessionManager::wait_for_checkpoint`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckpointResolution {
    pub action: CheckpointAction,
    pub data: Option<Value>,
}
