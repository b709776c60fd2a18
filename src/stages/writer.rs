//! Generates the report section-by-section from a compressed context bundle
//! and the current plan, streaming text deltas as it goes.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::compression::{CompressionConfig, CompressionService};
use crate::llm::CompletionProvider;
use crate::memory::ResearchMemory;
use crate::message::Message;

use super::{finish, Stage, StageContext, StageError, StagePartial};

pub struct Writer {
    provider: Arc<dyn CompletionProvider>,
    compression_config: CompressionConfig,
}

impl Writer {
    pub fn new(provider: Arc<dyn CompletionProvider>, compression_config: CompressionConfig) -> Self {
        Self {
            provider,
            compression_config,
        }
    }
}

#[async_trait]
impl Stage for Writer {
    async fn run(&self, memory: &mut ResearchMemory, ctx: StageContext) -> Result<StagePartial, StageError> {
        let started = Instant::now();
        let event = ctx.start_event("Writing report", "撰写报告");
        ctx.emit_agent_event(&event);

        let plan = memory.plan().cloned().ok_or(StageError::MissingInput { what: "research plan" })?;
        let papers: Vec<_> = memory.all_papers().cloned().collect();

        let compression = CompressionService::new(self.compression_config, Some(self.provider.as_ref()));
        let bundle = compression.compress(&papers, |_| "relevant to the research question".into()).await?;

        let feedback = memory.get_latest().and_then(|v| v.critic.clone());
        let mut prompt = format!(
            "Write a research report answering: {}\n\nSections expected: {}\n\nSource material:\n{}",
            plan.main_question,
            plan.expected_sections.join(", "),
            serde_json::to_string_pretty(&bundle.papers).unwrap_or_default()
        );
        if let Some(critic) = &feedback {
            prompt.push_str(&format!(
                "\n\nPrevious draft scored {:.1}. Address these gaps: {}",
                critic.overall_score,
                critic.gaps_identified.join("; ")
            ));
        }

        let messages = vec![Message::user(prompt)];
        let mut stream = self.provider.stream_text(&messages).await?;

        let stream_id = uuid::Uuid::new_v4().to_string();
        let mut content = String::new();
        while let Some(chunk) = stream.next().await {
            let delta = chunk?;
            content.push_str(&delta);
            ctx.emit_text_delta(&stream_id, delta);
        }
        ctx.emit_text_final(&stream_id);

        memory.save_report_version(content, None, feedback);

        let summary = format!("wrote iteration {} ({} tokens estimate)", memory.iteration(), bundle.total_tokens_estimate);
        let completed = finish(event, started);
        ctx.emit_agent_event(&completed);
        memory.record_event(completed.clone());

        Ok(StagePartial {
            summary,
            events: vec![completed],
        })
    }
}
