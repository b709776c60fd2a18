//! Per-session mutable working set: everything a pipeline run accumulates —
//! plan, search rounds, papers, citations, report drafts, topic coverage, and
//! gaps.
//!
//! Grounded on `state::VersionedState`'s versioned-channel idiom: one logical
//! channel per facet, each independently versioned so `get_stats`/`export`
//! can report "last mutated" without re-deriving it from the data itself.
//! Adapted rather than reused directly, since `state::VersionedState`'s three
//! fixed channels (messages/extra/errors) don't fit a research working set —
//! here every facet gets its own channel.

use std::time::Instant;

use chrono::Utc;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::model::{
    AgentEvent, Checkpoint, Citation, CriticAnalysis, GapStatus, MemoryStats, Paper, ProcessedTopic, QualityMetrics,
    ResearchPlan, SearchRound, TrackedGap,
};

#[derive(Clone, Debug, Default)]
struct Channel<T> {
    value: T,
    version: u32,
}

impl<T> Channel<T> {
    fn bump(&mut self) {
        self.version += 1;
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportVersion {
    pub iteration: u32,
    pub content: String,
    pub metrics: Option<QualityMetrics>,
    pub critic: Option<CriticAnalysis>,
    pub created_at: chrono::DateTime<Utc>,
}

/// Everything one research session accumulates. Not `Sync`-shared directly —
/// callers hold it behind whatever lock `session::SessionManager` chooses.
pub struct ResearchMemory {
    pub session_id: String,
    pub initial_query: String,
    started_at: Instant,

    plan: Channel<Option<ResearchPlan>>,
    rounds: Channel<Vec<SearchRound>>,
    papers: Channel<FxHashMap<String, Paper>>,
    citations: Channel<FxHashMap<String, Citation>>,
    reports: Channel<Vec<ReportVersion>>,
    processed_topics: Channel<FxHashMap<String, ProcessedTopic>>,
    gaps: Channel<FxHashMap<String, TrackedGap>>,
    insights: Channel<Vec<String>>,
    checkpoints: Channel<Vec<Checkpoint>>,
    timeline: Channel<Vec<AgentEvent>>,

    iteration: u32,
    searched_queries: FxHashSet<String>,
}

impl ResearchMemory {
    pub fn new(session_id: impl Into<String>, initial_query: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            initial_query: initial_query.into(),
            started_at: Instant::now(),
            plan: Channel::default(),
            rounds: Channel::default(),
            papers: Channel::default(),
            citations: Channel::default(),
            reports: Channel::default(),
            processed_topics: Channel::default(),
            gaps: Channel::default(),
            insights: Channel::default(),
            checkpoints: Channel::default(),
            timeline: Channel::default(),
            iteration: 0,
            searched_queries: FxHashSet::default(),
        }
    }

    pub fn set_plan(&mut self, plan: ResearchPlan) {
        self.plan.value = Some(plan);
        self.plan.bump();
    }

    pub fn plan(&self) -> Option<&ResearchPlan> {
        self.plan.value.as_ref()
    }

    pub fn add_search_round(&mut self, round: SearchRound) {
        self.searched_queries.insert(normalize_query(&round.query));
        self.add_papers(round.papers.clone());
        self.rounds.value.push(round);
        self.rounds.bump();
    }

    pub fn rounds(&self) -> &[SearchRound] {
        &self.rounds.value
    }

    pub fn add_papers(&mut self, papers: Vec<Paper>) {
        for paper in papers {
            let key = paper.canonical_key();
            match self.papers.value.get_mut(&key) {
                Some(existing) => existing.merge_from(paper),
                None => {
                    self.papers.value.insert(key, paper);
                }
            }
        }
        self.papers.bump();
    }

    pub fn get_paper(&self, id: &str) -> Option<&Paper> {
        self.papers
            .value
            .values()
            .find(|p| p.id == id || p.canonical_key() == id)
    }

    pub fn all_papers(&self) -> impl Iterator<Item = &Paper> {
        self.papers.value.values()
    }

    pub fn record_citation(&mut self, paper_id: &str, in_text_ref: &str, claim: impl Into<String>) -> &Citation {
        let entry = self
            .citations
            .value
            .entry(paper_id.to_string())
            .or_insert_with(|| Citation::new(paper_id, paper_id, in_text_ref));
        entry.claims.push(claim.into());
        self.citations.bump();
        self.citations.value.get(paper_id).expect("just inserted")
    }

    pub fn citations(&self) -> impl Iterator<Item = &Citation> {
        self.citations.value.values()
    }

    pub fn save_report_version(&mut self, content: impl Into<String>, metrics: Option<QualityMetrics>, critic: Option<CriticAnalysis>) {
        let iteration = self.reports.value.len() as u32 + 1;
        self.reports.value.push(ReportVersion {
            iteration,
            content: content.into(),
            metrics,
            critic,
            created_at: Utc::now(),
        });
        self.reports.bump();
    }

    pub fn get_latest(&self) -> Option<&ReportVersion> {
        self.reports.value.last()
    }

    pub fn get_previous(&self) -> Option<&ReportVersion> {
        let len = self.reports.value.len();
        if len < 2 {
            None
        } else {
            self.reports.value.get(len - 2)
        }
    }

    pub fn get_history(&self) -> &[ReportVersion] {
        &self.reports.value
    }

    pub fn add_insight(&mut self, insight: impl Into<String>) {
        self.insights.value.push(insight.into());
        self.insights.bump();
    }

    pub fn insights(&self) -> &[String] {
        &self.insights.value
    }

    /// Legacy string-set gap interface (spec.md §4.5): a gap is just a
    /// description; resolving removes it outright rather than transitioning
    /// status. Prefer `add_tracked_gap`/`update_gap_status` for new code.
    pub fn add_gap(&mut self, description: impl Into<String>) -> String {
        let gap = TrackedGap::new(description, self.iteration);
        let id = gap.id.clone();
        self.gaps.value.insert(id.clone(), gap);
        self.gaps.bump();
        id
    }

    pub fn resolve_gap(&mut self, id: &str) {
        self.gaps.value.remove(id);
        self.gaps.bump();
    }

    pub fn add_tracked_gap(&mut self, description: impl Into<String>) -> String {
        self.add_gap(description)
    }

    pub fn update_gap_status(&mut self, id: &str, status: GapStatus) {
        if let Some(gap) = self.gaps.value.get_mut(id) {
            gap.status = status;
            if matches!(status, GapStatus::Addressed) {
                gap.addressed_iteration = Some(self.iteration);
            }
            self.gaps.bump();
        }
    }

    pub fn gaps(&self) -> impl Iterator<Item = &TrackedGap> {
        self.gaps.value.values()
    }

    /// Normalises `topic`, unions in new queries/paper ids, and keeps the
    /// maximum observed `coverage` rather than overwriting it.
    pub fn track_processed_topic(&mut self, topic: &str, query: Option<&str>, paper_ids: &[String], coverage: f64) {
        let key = normalize_query(topic);
        let entry = self
            .processed_topics
            .value
            .entry(key)
            .or_insert_with(|| ProcessedTopic::new(topic, self.iteration));
        if let Some(q) = query {
            let nq = normalize_query(q);
            if !entry.search_queries.contains(&nq) {
                entry.search_queries.push(nq);
            }
        }
        for id in paper_ids {
            if !entry.paper_ids.contains(id) {
                entry.paper_ids.push(id.clone());
            }
        }
        entry.coverage = entry.coverage.max(coverage);
        entry.iteration = self.iteration;
        entry.timestamp = Utc::now();
        self.processed_topics.bump();
    }

    pub fn is_topic_processed(&self, topic: &str, min_coverage: f64) -> bool {
        self.processed_topics
            .value
            .get(&normalize_query(topic))
            .is_some_and(|t| t.coverage >= min_coverage)
    }

    pub fn get_uncovered_topics(&self, min_coverage: f64) -> Vec<&ProcessedTopic> {
        self.processed_topics
            .value
            .values()
            .filter(|t| t.coverage < min_coverage)
            .collect()
    }

    /// A search is redundant when the exact normalised query already ran in
    /// a prior round, or any token longer than 3 chars belongs to a topic
    /// already covered at ≥ 80%.
    pub fn is_search_redundant(&self, query: &str) -> bool {
        let normalized = normalize_query(query);
        if self.searched_queries.contains(&normalized) {
            return true;
        }
        normalized
            .split_whitespace()
            .filter(|tok| tok.len() > 3)
            .any(|tok| {
                self.processed_topics
                    .value
                    .values()
                    .any(|t| t.coverage >= 0.8 && normalize_query(&t.topic).contains(tok))
            })
    }

    pub fn increment_iteration(&mut self) -> u32 {
        self.iteration += 1;
        self.iteration
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn record_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.checkpoints.value.push(checkpoint);
        self.checkpoints.bump();
    }

    pub fn record_event(&mut self, event: AgentEvent) {
        self.timeline.value.push(event);
        self.timeline.bump();
    }

    pub fn timeline(&self) -> &[AgentEvent] {
        &self.timeline.value
    }

    pub fn get_stats(&self) -> MemoryStats {
        let open_gaps = self.gaps.value.values().filter(|g| matches!(g.status, GapStatus::Open | GapStatus::InProgress)).count();
        let addressed_gaps = self.gaps.value.values().filter(|g| matches!(g.status, GapStatus::Addressed)).count();
        MemoryStats {
            paper_count: self.papers.value.len(),
            round_count: self.rounds.value.len(),
            citation_count: self.citations.value.len(),
            open_gap_count: open_gaps,
            addressed_gap_count: addressed_gaps,
            iteration: self.iteration,
            elapsed_ms: self.started_at.elapsed().as_millis() as i64,
        }
    }

    pub fn get_context_summary(&self) -> String {
        let stats = self.get_stats();
        format!(
            "iteration {} | {} papers across {} rounds | {} citations | {} open gaps",
            stats.iteration, stats.paper_count, stats.round_count, stats.citation_count, stats.open_gap_count
        )
    }

    /// Papers + insights that fit within `max_tokens` (chars/4 estimate),
    /// highest-citation papers first.
    pub fn get_relevant_context(&self, max_tokens: usize) -> Vec<String> {
        let mut papers: Vec<&Paper> = self.papers.value.values().collect();
        papers.sort_by_key(|p| std::cmp::Reverse(p.citations.unwrap_or(0)));

        let mut budget = max_tokens;
        let mut out = Vec::new();
        for paper in papers {
            let line = format!("{} ({}): {}", paper.title, paper.year.unwrap_or(0), paper.abstract_text.clone().unwrap_or_default());
            let tokens = line.len().div_ceil(4);
            if tokens > budget {
                break;
            }
            budget -= tokens;
            out.push(line);
        }
        for insight in &self.insights.value {
            let tokens = insight.len().div_ceil(4);
            if tokens > budget {
                break;
            }
            budget -= tokens;
            out.push(insight.clone());
        }
        out
    }

    pub fn export(&self) -> Result<serde_json::Value, crate::error::CoreError> {
        serde_json::to_value(ExportedMemory {
            session_id: self.session_id.clone(),
            initial_query: self.initial_query.clone(),
            plan: self.plan.value.clone(),
            rounds: self.rounds.value.clone(),
            papers: self.papers.value.values().cloned().collect(),
            citations: self.citations.value.values().cloned().collect(),
            reports: self.reports.value.clone(),
            processed_topics: self.processed_topics.value.values().cloned().collect(),
            gaps: self.gaps.value.values().cloned().collect(),
            insights: self.insights.value.clone(),
            iteration: self.iteration,
        })
        .map_err(|e| crate::error::CoreError::internal(format!("memory export failed: {e}")))
    }

    pub fn import(session_id: impl Into<String>, value: serde_json::Value) -> Result<Self, crate::error::CoreError> {
        let exported: ExportedMemory =
            serde_json::from_value(value).map_err(|e| crate::error::CoreError::internal(format!("memory import failed: {e}")))?;
        let mut memory = Self::new(session_id, exported.initial_query.clone());
        if let Some(plan) = exported.plan {
            memory.set_plan(plan);
        }
        for round in exported.rounds {
            memory.add_search_round(round);
        }
        memory.add_papers(exported.papers);
        for citation in exported.citations {
            for claim in citation.claims {
                memory.record_citation(&citation.paper_id, &citation.in_text_ref, claim);
            }
        }
        memory.reports.value = exported.reports;
        for topic in exported.processed_topics {
            let key = normalize_query(&topic.topic);
            memory.processed_topics.value.insert(key, topic);
        }
        for gap in exported.gaps {
            memory.gaps.value.insert(gap.id.clone(), gap);
        }
        memory.insights.value = exported.insights;
        memory.iteration = exported.iteration;
        Ok(memory)
    }
}

#[derive(Serialize, Deserialize)]
struct ExportedMemory {
    session_id: String,
    initial_query: String,
    plan: Option<ResearchPlan>,
    rounds: Vec<SearchRound>,
    papers: Vec<Paper>,
    citations: Vec<Citation>,
    reports: Vec<ReportVersion>,
    processed_topics: Vec<ProcessedTopic>,
    gaps: Vec<TrackedGap>,
    insights: Vec<String>,
    iteration: u32,
}

fn normalize_query(query: &str) -> String {
    let mut tokens: Vec<String> = query
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    tokens.sort();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::paper::DataAvailability;

    fn paper(id: &str) -> Paper {
        Paper {
            id: id.to_string(),
            title: format!("paper {id}"),
            data_availability: DataAvailability::WithAbstract,
            source_origin: vec![crate::model::SourceId::Core],
            ..Default::default()
        }
    }

    #[test]
    fn search_round_is_redundant_on_exact_repeat() {
        let mut memory = ResearchMemory::new("s1", "what");
        let mut round = SearchRound::new(1, "deep learning survey");
        round.papers.push(paper("p1"));
        memory.add_search_round(round);
        assert!(memory.is_search_redundant("Deep Learning Survey"));
        assert!(!memory.is_search_redundant("reinforcement learning"));
    }

    #[test]
    fn topic_tracking_keeps_max_coverage() {
        let mut memory = ResearchMemory::new("s1", "what");
        memory.track_processed_topic("transfer learning", Some("q1"), &["p1".into()], 0.4);
        memory.track_processed_topic("transfer learning", Some("q2"), &["p2".into()], 0.2);
        assert!(memory.is_topic_processed("transfer learning", 0.4));
        assert!(!memory.is_topic_processed("transfer learning", 0.5));
    }

    #[test]
    fn export_import_round_trips_papers_and_plan() {
        let mut memory = ResearchMemory::new("s1", "what");
        memory.set_plan(ResearchPlan {
            main_question: "what".into(),
            ..Default::default()
        });
        memory.add_papers(vec![paper("p1")]);
        let exported = memory.export().unwrap();
        let restored = ResearchMemory::import("s1", exported).unwrap();
        assert_eq!(restored.plan().unwrap().main_question, "what");
        assert_eq!(restored.get_stats().paper_count, 1);
    }

    #[test]
    fn citation_claims_accumulate_per_paper() {
        let mut memory = ResearchMemory::new("s1", "what");
        memory.record_citation("p1", "[1]", "claim a");
        memory.record_citation("p1", "[1]", "claim b");
        let citation = memory.citations().find(|c| c.paper_id == "p1").unwrap();
        assert_eq!(citation.claims.len(), 2);
    }
}
