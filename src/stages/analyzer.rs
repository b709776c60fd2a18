//! Scores papers for relevance per sub-question and distills insights and
//! candidate gaps into memory.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::llm::CompletionProvider;
use crate::memory::ResearchMemory;

use super::{finish, Stage, StageContext, StageError, StagePartial};

const ANALYSIS_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "insights": { "type": "array", "items": { "type": "string" } },
    "gaps": { "type": "array", "items": { "type": "string" } }
  },
  "required": ["insights", "gaps"]
}"#;

pub struct Analyzer {
    provider: Arc<dyn CompletionProvider>,
}

impl Analyzer {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Stage for Analyzer {
    async fn run(&self, memory: &mut ResearchMemory, ctx: StageContext) -> Result<StagePartial, StageError> {
        let started = Instant::now();
        let event = ctx.start_event("Analyzing evidence", "分析证据");
        ctx.emit_agent_event(&event);

        let plan = memory.plan().cloned().ok_or(StageError::MissingInput { what: "research plan" })?;
        let titles: Vec<&str> = memory.all_papers().map(|p| p.title.as_str()).collect();

        let schema: serde_json::Value = serde_json::from_str(ANALYSIS_SCHEMA).expect("static schema is valid JSON");
        let prompt = format!(
            "Research question: {}\nSub-questions: {}\nPapers found: {}\n\nIdentify key insights and research gaps.",
            plan.main_question,
            plan.sub_questions.join("; "),
            titles.join("; ")
        );
        let value = self.provider.structured_generate(&prompt, &schema).await?;

        let insights: Vec<String> = value
            .get("insights")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let gaps: Vec<String> = value
            .get("gaps")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        for insight in &insights {
            memory.add_insight(insight.clone());
        }
        for gap in &gaps {
            memory.add_tracked_gap(gap.clone());
        }

        let summary = format!("{} insights, {} gaps", insights.len(), gaps.len());
        let completed = finish(event, started);
        ctx.emit_agent_event(&completed);
        memory.record_event(completed.clone());

        Ok(StagePartial {
            summary,
            events: vec![completed],
        })
    }
}
