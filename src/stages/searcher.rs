//! Runs each search strategy across search rounds, calling the Federator and
//! tracking topic coverage.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::cache::SearchOptions;
use crate::federator::Federator;
use crate::memory::ResearchMemory;
use crate::model::paper::SourceId;
use crate::model::round::SearchRound;

use super::{finish, Stage, StageContext, StageError, StagePartial};

pub struct Searcher {
    federator: Arc<Federator>,
    max_search_rounds: u32,
}

impl Searcher {
    pub fn new(federator: Arc<Federator>, max_search_rounds: u32) -> Self {
        Self {
            federator,
            max_search_rounds,
        }
    }

    fn coverage(sub_question: &str, papers: &[crate::model::paper::Paper]) -> f64 {
        let keywords: Vec<&str> = sub_question.split_whitespace().filter(|w| w.len() > 3).collect();
        if keywords.is_empty() {
            return 0.0;
        }
        let haystack: String = papers
            .iter()
            .map(|p| format!("{} {}", p.title, p.abstract_text.as_deref().unwrap_or("")))
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let hits = keywords.iter().filter(|k| haystack.contains(&k.to_lowercase())).count();
        hits as f64 / keywords.len() as f64
    }
}

#[async_trait]
impl Stage for Searcher {
    async fn run(&self, memory: &mut ResearchMemory, ctx: StageContext) -> Result<StagePartial, StageError> {
        let started = Instant::now();
        let event = ctx.start_event("Searching literature", "检索文献");
        ctx.emit_agent_event(&event);

        let plan = memory.plan().cloned().ok_or(StageError::MissingInput { what: "research plan" })?;
        let mut total_papers = 0usize;
        let mut round_number = memory.rounds().len() as u32;

        'strategies: for strategy in &plan.search_strategies {
            let query = strategy.keywords.join(" ");
            for sub_question in plan.sub_questions.iter().chain(std::iter::once(&plan.main_question)) {
                if round_number >= self.max_search_rounds {
                    break 'strategies;
                }
                if memory.is_search_redundant(&query) {
                    continue;
                }

                round_number += 1;
                let options = SearchOptions {
                    year_range: strategy.year_range,
                    open_access_only: false,
                };
                let result = self.federator.search(&query, &options, None).await;

                let mut round = SearchRound::new(round_number, query.clone());
                round.strategy = Some(strategy.clone());
                round.papers = result.papers.clone();
                for (source_name, count) in &result.source_breakdown {
                    if let Some(source_id) = source_id(source_name) {
                        round.record_source(source_id, *count as u32);
                    }
                }
                total_papers += round.papers.len();

                let coverage = Self::coverage(sub_question, &round.papers);
                let paper_ids: Vec<String> = round.papers.iter().map(|p| p.id.clone()).collect();

                ctx.emit_stage("papers_found", format!("{} papers for \"{query}\"", round.papers.len()));
                memory.add_search_round(round);
                memory.track_processed_topic(sub_question, Some(&query), &paper_ids, coverage);
            }
        }

        let summary = format!("{total_papers} papers across {round_number} rounds");
        let completed = finish(event, started);
        ctx.emit_agent_event(&completed);
        memory.record_event(completed.clone());

        Ok(StagePartial {
            summary,
            events: vec![completed],
        })
    }
}

fn source_id(name: &str) -> Option<SourceId> {
    crate::federator::source_id_for_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::paper::{DataAvailability, Paper};

    #[test]
    fn coverage_counts_matching_long_keywords() {
        let papers = vec![Paper {
            title: "Deep learning for climate modelling".into(),
            data_availability: DataAvailability::WithAbstract,
            source_origin: vec![SourceId::Core],
            ..Default::default()
        }];
        let coverage = Searcher::coverage("how does climate modelling benefit from deep learning", &papers);
        assert!(coverage > 0.5);
    }
}
