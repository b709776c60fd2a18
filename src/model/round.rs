//! A single federated-search round, as recorded into research memory.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::model::paper::{Paper, SourceId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRound {
    pub round: u32,
    pub query: String,
    pub strategy: Option<crate::model::plan::SearchStrategy>,
    pub papers: Vec<Paper>,
    pub source_breakdown: FxHashMap<String, u32>,
    pub timestamp: DateTime<Utc>,
}

impl SearchRound {
    pub fn new(round: u32, query: impl Into<String>) -> Self {
        Self {
            round,
            query: query.into(),
            strategy: None,
            papers: Vec::new(),
            source_breakdown: FxHashMap::default(),
            timestamp: Utc::now(),
        }
    }

    pub fn record_source(&mut self, source: SourceId, count: u32) {
        *self.source_breakdown.entry(source.to_string()).or_insert(0) += count;
    }
}
