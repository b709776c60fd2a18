//! Topic coverage tracking and research gaps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessedTopic {
    pub topic: String,
    pub search_queries: Vec<String>,
    pub paper_ids: Vec<String>,
    pub coverage: f64,
    pub iteration: u32,
    pub timestamp: DateTime<Utc>,
}

impl ProcessedTopic {
    pub fn new(topic: impl Into<String>, iteration: u32) -> Self {
        Self {
            topic: topic.into(),
            search_queries: Vec::new(),
            paper_ids: Vec::new(),
            coverage: 0.0,
            iteration,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapStatus {
    Open,
    InProgress,
    Addressed,
    WontFix,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackedGap {
    pub id: String,
    pub description: String,
    pub status: GapStatus,
    pub searches_attempted: Vec<String>,
    pub papers_found: Vec<String>,
    pub iteration: u32,
    pub addressed_iteration: Option<u32>,
}

impl TrackedGap {
    pub fn new(description: impl Into<String>, iteration: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            status: GapStatus::Open,
            searches_attempted: Vec::new(),
            papers_found: Vec::new(),
            iteration,
            addressed_iteration: None,
        }
    }
}
