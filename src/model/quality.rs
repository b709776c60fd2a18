//! Quality metrics and critic output produced at the Reviewing stage.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub overall_score: f64,
    pub coverage_score: f64,
    pub citation_density: f64,
    pub recency_score: f64,
    pub unique_sources_used: u32,
    pub open_access_percentage: f64,
    pub per_sub_question_coverage: FxHashMap<String, f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityDecision {
    Pass,
    Iterate,
    Fail,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CriticAnalysis {
    pub overall_score: f64,
    pub gaps_identified: Vec<String>,
    pub improvement_suggestions: Vec<String>,
    pub per_section_notes: FxHashMap<String, String>,
}

/// Tunables for the Critic's pass/iterate/fail decision (spec.md §4.8/§6).
#[derive(Clone, Copy, Debug)]
pub struct QualityGateConfig {
    pub min_overall_score: f64,
    pub max_iterations: u32,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            min_overall_score: 70.0,
            max_iterations: 3,
        }
    }
}

impl QualityGateConfig {
    pub fn decide(&self, metrics: &QualityMetrics, iteration: u32) -> QualityDecision {
        if metrics.overall_score >= self.min_overall_score {
            QualityDecision::Pass
        } else if iteration < self.max_iterations {
            QualityDecision::Iterate
        } else {
            QualityDecision::Fail
        }
    }
}
