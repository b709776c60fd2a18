//! Produces a `ResearchPlan` from the user's query.

use std::time::Instant;

use async_trait::async_trait;

use crate::llm::CompletionProvider;
use crate::memory::ResearchMemory;
use crate::model::plan::{ResearchPlan, SearchStrategy};

use super::{finish, Stage, StageContext, StageError, StagePartial};

const PLAN_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "main_question": { "type": "string" },
    "sub_questions": { "type": "array", "items": { "type": "string" } },
    "search_strategies": {
      "type": "array",
      "items": {
        "type": "object",
        "properties": {
          "keywords": { "type": "array", "items": { "type": "string" } },
          "year_range": { "type": "array", "items": { "type": "integer" }, "minItems": 2, "maxItems": 2 }
        }
      }
    },
    "expected_sections": { "type": "array", "items": { "type": "string" } }
  },
  "required": ["main_question", "sub_questions", "search_strategies", "expected_sections"]
}"#;

pub struct Planner {
    provider: std::sync::Arc<dyn CompletionProvider>,
}

impl Planner {
    pub fn new(provider: std::sync::Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// `edit` checkpoint resolution re-runs the Planner once with the
    /// client's feedback folded into the prompt.
    pub async fn plan(&self, query: &str, feedback: Option<&str>) -> Result<ResearchPlan, StageError> {
        let schema: serde_json::Value = serde_json::from_str(PLAN_SCHEMA).expect("static schema is valid JSON");
        let mut prompt = format!("Produce a research plan for the question: {query}");
        if let Some(feedback) = feedback {
            prompt.push_str(&format!("\n\nIncorporate this reviewer feedback: {feedback}"));
        }
        let value = self.provider.structured_generate(&prompt, &schema).await?;
        Ok(parse_plan(&value, query))
    }
}

fn parse_plan(value: &serde_json::Value, fallback_question: &str) -> ResearchPlan {
    let main_question = value
        .get("main_question")
        .and_then(|v| v.as_str())
        .unwrap_or(fallback_question)
        .to_string();
    let sub_questions = value
        .get("sub_questions")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let expected_sections = value
        .get("expected_sections")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let search_strategies = value
        .get("search_strategies")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .map(|s| SearchStrategy {
                    keywords: s
                        .get("keywords")
                        .and_then(|k| k.as_array())
                        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                        .unwrap_or_default(),
                    year_range: s.get("year_range").and_then(|r| r.as_array()).and_then(|arr| match arr.as_slice() {
                        [from, to] => Some((from.as_u64()? as u32, to.as_u64()? as u32)),
                        _ => None,
                    }),
                    preferred_sources: Vec::new(),
                })
                .collect()
        })
        .unwrap_or_else(|| vec![SearchStrategy { keywords: vec![fallback_question.to_string()], ..Default::default() }]);

    ResearchPlan {
        main_question,
        sub_questions,
        search_strategies,
        expected_sections,
    }
}

#[async_trait]
impl Stage for Planner {
    async fn run(&self, memory: &mut ResearchMemory, ctx: StageContext) -> Result<StagePartial, StageError> {
        let started = Instant::now();
        let event = ctx.start_event("Planning research", "规划研究");
        ctx.emit_agent_event(&event);

        let query = memory.initial_query.clone();
        let plan = self.plan(&query, None).await?;
        memory.set_plan(plan.clone());

        let summary = format!("plan with {} sub-questions, {} strategies", plan.sub_questions.len(), plan.search_strategies.len());
        let completed = finish(event, started);
        ctx.emit_agent_event(&completed);
        memory.record_event(completed.clone());

        Ok(StagePartial {
            summary,
            events: vec![completed],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plan_falls_back_to_query_when_fields_missing() {
        let plan = parse_plan(&serde_json::json!({}), "what causes X?");
        assert_eq!(plan.main_question, "what causes X?");
        assert_eq!(plan.search_strategies.len(), 1);
    }
}
