//! The research plan produced by the Planner stage.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchStrategy {
    pub keywords: Vec<String>,
    pub year_range: Option<(u32, u32)>,
    pub preferred_sources: Vec<crate::model::paper::SourceId>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub main_question: String,
    pub sub_questions: Vec<String>,
    pub search_strategies: Vec<SearchStrategy>,
    pub expected_sections: Vec<String>,
}
