//! `AgentEvent`: the unified timeline unit shown to a client over a session.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planning,
    Searching,
    Analyzing,
    Writing,
    Reviewing,
    Validating,
    Complete,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentEventStatus {
    Pending,
    Running,
    Success,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentEvent {
    pub id: String,
    pub stage: Stage,
    pub title_en: String,
    pub title_zh: String,
    pub status: AgentEventStatus,
    pub iteration: Option<u32>,
    pub total_iterations: Option<u32>,
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub meta: FxHashMap<String, Value>,
}

impl AgentEvent {
    pub fn start(stage: Stage, title_en: impl Into<String>, title_zh: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            stage,
            title_en: title_en.into(),
            title_zh: title_zh.into(),
            status: AgentEventStatus::Running,
            iteration: None,
            total_iterations: None,
            duration_ms: None,
            meta: FxHashMap::default(),
        }
    }

    pub fn with_iteration(mut self, iteration: u32, total: u32) -> Self {
        self.iteration = Some(iteration);
        self.total_iterations = Some(total);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    pub fn complete(&self, status: AgentEventStatus, duration_ms: u64) -> Self {
        let mut clone = self.clone();
        clone.status = status;
        clone.duration_ms = Some(duration_ms);
        clone
    }
}
