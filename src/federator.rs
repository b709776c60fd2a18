//! Fan out a query to every enabled bibliographic source, merge and rank the
//! results, and cache both the raw answer and every paper touched.
//!
//! Grounded on the bounded-`JoinSet` + global-deadline shape spec.md
//! prescribes; HTTP/JSON plumbing in `sources::*` is grounded on
//! `other_examples/.../papeline-semantic-scholar-src-worker.rs`, adapted from
//! offline shard processing to live per-query calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use tokio::task::JoinSet;
use tracing::warn;

use crate::cache::{PaperCache, QueryCache, SearchOptions, SessionQueryCache};
use crate::model::paper::{Paper, SourceId};
use crate::sources::SourceClient;

#[derive(Clone, Copy, Debug)]
pub struct PrioritizationWeights {
    pub citations: f64,
    pub recency: f64,
    pub keyword: f64,
    pub open_access: f64,
}

impl Default for PrioritizationWeights {
    fn default() -> Self {
        Self {
            citations: 0.3,
            recency: 0.2,
            keyword: 0.4,
            open_access: 0.1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FederatorConfig {
    pub deadline: Duration,
    pub weights: PrioritizationWeights,
    pub top_n: usize,
}

impl Default for FederatorConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(20),
            weights: PrioritizationWeights::default(),
            top_n: 30,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FederatedSearch {
    pub papers: Vec<Paper>,
    pub source_breakdown: HashMap<String, usize>,
    pub from_cache: bool,
}

pub struct Federator {
    config: FederatorConfig,
    sources: Vec<Arc<dyn SourceClient>>,
    paper_cache: Arc<PaperCache>,
    query_cache: Arc<QueryCache>,
}

impl Federator {
    pub fn new(
        sources: Vec<Arc<dyn SourceClient>>,
        paper_cache: Arc<PaperCache>,
        query_cache: Arc<QueryCache>,
        config: FederatorConfig,
    ) -> Self {
        Self {
            config,
            sources,
            paper_cache,
            query_cache,
        }
    }

    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
        session_cache: Option<&mut SessionQueryCache>,
    ) -> FederatedSearch {
        if let Some(cache) = session_cache {
            if let Some(papers) = cache.get(query, options) {
                return FederatedSearch {
                    papers,
                    source_breakdown: HashMap::new(),
                    from_cache: true,
                };
            }
        }
        if let Some(papers) = self.query_cache.get(query, options) {
            return FederatedSearch {
                papers,
                source_breakdown: HashMap::new(),
                from_cache: true,
            };
        }

        let mut join_set = JoinSet::new();
        for source in &self.sources {
            let source = source.clone();
            let query = query.to_string();
            let options = options.clone();
            join_set.spawn(async move {
                let name = source.name();
                if !source.is_available().await {
                    return (name, Vec::new());
                }
                match source.search(&query, &options, 50).await {
                    Ok(result) => (name, result.papers),
                    Err(err) => {
                        warn!(source = name, error = %err, "source search failed, degrading to empty result");
                        (name, Vec::new())
                    }
                }
            });
        }

        let mut by_key: HashMap<String, Paper> = HashMap::new();
        let mut source_breakdown = HashMap::new();

        let fan_out = async {
            while let Some(joined) = join_set.join_next().await {
                let Ok((name, papers)) = joined else { continue };
                for paper in papers {
                    let key = paper.canonical_key();
                    self.paper_cache.update(paper.clone());
                    match by_key.get_mut(&key) {
                        Some(existing) => existing.merge_from(paper),
                        None => {
                            // Credit the source that first contributed this distinct
                            // paper; later sources returning the same canonical key
                            // only merge into it, so they don't get double-counted.
                            *source_breakdown.entry(name.to_string()).or_insert(0) += 1;
                            by_key.insert(key, paper);
                        }
                    }
                }
            }
        };

        if tokio::time::timeout(self.config.deadline, fan_out).await.is_err() {
            warn!(deadline_ms = self.config.deadline.as_millis(), "federated search hit its deadline; returning partial results");
            join_set.abort_all();
        }

        let mut papers: Vec<Paper> = by_key.into_values().collect();
        self.rank(query, &mut papers);
        papers.truncate(self.config.top_n);

        self.query_cache.set(query, options, &papers, &self.paper_cache);

        FederatedSearch {
            papers,
            source_breakdown,
            from_cache: false,
        }
    }

    fn rank(&self, query: &str, papers: &mut [Paper]) {
        let w = self.config.weights;
        let keywords: Vec<String> = query.to_lowercase().split_whitespace().map(str::to_string).collect();
        let now_year = Utc::now().year() as f64;

        let max_citations = papers.iter().filter_map(|p| p.citations).max().unwrap_or(0).max(1) as f64;

        papers.sort_by(|a, b| {
            let score_a = self.score(a, &keywords, max_citations, now_year, w);
            let score_b = self.score(b, &keywords, max_citations, now_year, w);
            score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    fn score(&self, paper: &Paper, keywords: &[String], max_citations: f64, now_year: f64, w: PrioritizationWeights) -> f64 {
        let citations_norm = paper.citations.unwrap_or(0) as f64 / max_citations;
        let recency = paper
            .year
            .map(|y| (1.0 - (now_year - y as f64) / 20.0).max(0.0))
            .unwrap_or(0.0);
        let haystack = format!(
            "{} {}",
            paper.title.to_lowercase(),
            paper.abstract_text.as_deref().unwrap_or("").to_lowercase()
        );
        let keyword_hits = keywords.iter().filter(|k| haystack.contains(k.as_str())).count();
        let keyword_relevance = if keywords.is_empty() {
            0.0
        } else {
            keyword_hits as f64 / keywords.len() as f64
        };
        let open_access = if paper.open_access { 1.0 } else { 0.0 };

        w.citations * citations_norm + w.recency * recency + w.keyword * keyword_relevance + w.open_access * open_access
    }
}

pub fn source_id_for_name(name: &str) -> Option<SourceId> {
    match name {
        "core" => Some(SourceId::Core),
        "semantic_scholar" => Some(SourceId::SemanticScholar),
        "openalex" => Some(SourceId::OpenAlex),
        "arxiv" => Some(SourceId::Arxiv),
        "pubmed" => Some(SourceId::PubMed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::paper::DataAvailability;

    fn paper(id: &str, citations: u32, year: u32, open_access: bool) -> Paper {
        Paper {
            id: id.to_string(),
            title: format!("paper about {id}"),
            citations: Some(citations),
            year: Some(year),
            open_access,
            data_availability: DataAvailability::WithAbstract,
            source_origin: vec![SourceId::Core],
            ..Default::default()
        }
    }

    #[test]
    fn ranking_favors_higher_citations_and_open_access() {
        let federator = Federator::new(
            Vec::new(),
            Arc::new(PaperCache::default()),
            Arc::new(QueryCache::default()),
            FederatorConfig::default(),
        );
        let mut papers = vec![paper("low", 1, 2020, false), paper("high", 1000, 2020, true)];
        federator.rank("paper", &mut papers);
        assert_eq!(papers[0].id, "high");
    }
}
