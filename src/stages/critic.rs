//! Computes `QualityMetrics` and `CriticAnalysis` over the current report
//! version and decides pass/iterate/fail.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::llm::CompletionProvider;
use crate::memory::ResearchMemory;
use crate::model::quality::{CriticAnalysis, QualityDecision, QualityGateConfig, QualityMetrics};

use super::{finish, Stage, StageContext, StageError, StagePartial};

const CRITIC_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "overall_score": { "type": "number" },
    "coverage_score": { "type": "number" },
    "citation_density": { "type": "number" },
    "recency_score": { "type": "number" },
    "gaps_identified": { "type": "array", "items": { "type": "string" } },
    "improvement_suggestions": { "type": "array", "items": { "type": "string" } }
  },
  "required": ["overall_score", "coverage_score", "citation_density", "recency_score", "gaps_identified", "improvement_suggestions"]
}"#;

pub struct Critic {
    provider: Arc<dyn CompletionProvider>,
    quality_gate: QualityGateConfig,
}

impl Critic {
    pub fn new(provider: Arc<dyn CompletionProvider>, quality_gate: QualityGateConfig) -> Self {
        Self { provider, quality_gate }
    }

    pub fn quality_gate(&self) -> &QualityGateConfig {
        &self.quality_gate
    }
}

#[async_trait]
impl Stage for Critic {
    async fn run(&self, memory: &mut ResearchMemory, ctx: StageContext) -> Result<StagePartial, StageError> {
        let started = Instant::now();
        let event = ctx.start_event("Reviewing draft", "审阅草稿");
        ctx.emit_agent_event(&event);

        let report = memory.get_latest().ok_or(StageError::MissingInput { what: "report draft" })?.content.clone();
        let open_access_papers = memory.all_papers().filter(|p| p.open_access).count();
        let total_papers = memory.all_papers().count().max(1);
        let open_access_percentage = open_access_papers as f64 / total_papers as f64 * 100.0;
        let unique_sources: std::collections::HashSet<_> = memory.all_papers().flat_map(|p| p.source_origin.clone()).collect();

        let schema: serde_json::Value = serde_json::from_str(CRITIC_SCHEMA).expect("static schema is valid JSON");
        let prompt = format!("Critically evaluate this research report draft for completeness, citation density, and currency:\n\n{report}");
        let value = self.provider.structured_generate(&prompt, &schema).await?;

        let metrics = QualityMetrics {
            overall_score: value.get("overall_score").and_then(|v| v.as_f64()).unwrap_or(0.0),
            coverage_score: value.get("coverage_score").and_then(|v| v.as_f64()).unwrap_or(0.0),
            citation_density: value.get("citation_density").and_then(|v| v.as_f64()).unwrap_or(0.0),
            recency_score: value.get("recency_score").and_then(|v| v.as_f64()).unwrap_or(0.0),
            unique_sources_used: unique_sources.len() as u32,
            open_access_percentage,
            per_sub_question_coverage: FxHashMap::default(),
        };

        let critic = CriticAnalysis {
            overall_score: metrics.overall_score,
            gaps_identified: value
                .get("gaps_identified")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default(),
            improvement_suggestions: value
                .get("improvement_suggestions")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default(),
            per_section_notes: FxHashMap::default(),
        };

        for gap in &critic.gaps_identified {
            memory.add_tracked_gap(gap.clone());
        }

        let decision = self.quality_gate.decide(&metrics, memory.iteration());
        ctx.emit_stage("quality_decision", format!("{decision:?} at score {:.1}", metrics.overall_score));

        if let Some(latest) = memory.get_latest() {
            let content = latest.content.clone();
            memory.save_report_version(content, Some(metrics), Some(critic));
        }

        let summary = format!("{decision:?}");
        let completed = finish(event, started);
        ctx.emit_agent_event(&completed);
        memory.record_event(completed.clone());

        Ok(StagePartial {
            summary,
            events: vec![completed],
        })
    }
}

pub fn decide(quality_gate: &QualityGateConfig, metrics: &QualityMetrics, iteration: u32) -> QualityDecision {
    quality_gate.decide(metrics, iteration)
}
