//! Verifies every in-text citation resolves to a paper in memory with
//! consistent metadata, and marks inconsistencies as gaps rather than
//! failing the pipeline outright.

use std::time::Instant;

use async_trait::async_trait;

use crate::memory::ResearchMemory;

use super::{finish, Stage, StageContext, StageError, StagePartial};

/// One citation that could not be resolved against `memory`'s paper set.
#[derive(Debug, PartialEq)]
pub struct CitationInconsistency {
    pub citation_id: String,
    pub reason: String,
}

/// Cross-checks recorded citations against the report text and the paper
/// set: every `in_text_ref` the report uses must map to a citation whose
/// `paper_id` still resolves to a known paper.
pub fn validate(memory: &ResearchMemory) -> Vec<CitationInconsistency> {
    let report = memory.get_latest().map(|v| v.content.as_str()).unwrap_or("");
    let mut problems = Vec::new();

    for citation in memory.citations() {
        if memory.get_paper(&citation.paper_id).is_none() {
            problems.push(CitationInconsistency {
                citation_id: citation.id.clone(),
                reason: format!("citation {} references unknown paper {}", citation.id, citation.paper_id),
            });
            continue;
        }
        if !citation.in_text_ref.is_empty() && !report.contains(&citation.in_text_ref) {
            problems.push(CitationInconsistency {
                citation_id: citation.id.clone(),
                reason: format!("in-text marker {} not found in the current draft", citation.in_text_ref),
            });
        }
    }

    problems
}

pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for Validator {
    async fn run(&self, memory: &mut ResearchMemory, ctx: StageContext) -> Result<StagePartial, StageError> {
        let started = Instant::now();
        let event = ctx.start_event("Validating citations", "校验引用");
        ctx.emit_agent_event(&event);

        let problems = validate(memory);
        for problem in &problems {
            memory.add_tracked_gap(problem.reason.clone());
        }

        let summary = if problems.is_empty() {
            "all citations resolve".to_string()
        } else {
            format!("{} citation inconsistencies found", problems.len())
        };
        ctx.emit_stage("validation", summary.clone());

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
    use crate::model::paper::DataAvailability;
    use crate::model::paper::Paper;

    #[test]
    fn flags_citation_with_unknown_paper() {
        let mut memory = ResearchMemory::new("s1", "what");
        memory.record_citation("missing", "[1]", "claim");
        let problems = validate(&memory);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].reason.contains("unknown paper"));
    }

    #[test]
    fn passes_when_citation_resolves_and_marker_is_quoted() {
        let mut memory = ResearchMemory::new("s1", "what");
        memory.add_papers(vec![Paper {
            id: "p1".into(),
            title: "t".into(),
            data_availability: DataAvailability::WithAbstract,
            source_origin: vec![crate::model::SourceId::Core],
            ..Default::default()
        }]);
        memory.record_citation("p1", "[1]", "claim");
        memory.save_report_version("text with [1] marker", None, None);
        assert!(validate(&memory).is_empty());
    }
}
