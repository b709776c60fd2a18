//! Token-budget-aware compression of a paper set into a structured context
//! bundle for the Writer stage.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::llm::CompletionProvider;
use crate::model::paper::Paper;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompressedPaper {
    pub title: String,
    pub short_authors: String,
    pub year: Option<u32>,
    pub key_findings: Vec<String>,
    pub methodology: Option<String>,
    pub relevance: String,
    pub doi: Option<String>,
    pub citation_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CompressionResult {
    pub papers: Vec<CompressedPaper>,
    pub total_tokens_estimate: usize,
    pub compression_ratio: f64,
    pub summary: String,
}

#[derive(Clone, Copy, Debug)]
pub struct CompressionConfig {
    pub max_tokens_per_paper: usize,
    pub max_total_tokens: usize,
    pub structured_generate_threshold_chars: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_paper: 200,
            max_total_tokens: 8000,
            structured_generate_threshold_chars: 300,
        }
    }
}

fn estimate_tokens(s: &str) -> usize {
    s.len().div_ceil(4)
}

fn short_authors(authors: &[String]) -> String {
    match authors {
        [] => String::new(),
        [one] => one.clone(),
        [one, two] => format!("{one} & {two}"),
        [one, ..] => format!("{one} et al."),
    }
}

fn citation_key(paper: &Paper) -> String {
    let surname = paper
        .authors
        .first()
        .and_then(|a| a.split_whitespace().last())
        .unwrap_or("anon")
        .to_lowercase();
    format!("{surname}{}", paper.year.unwrap_or(0))
}

fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    let max_chars = max_tokens * 4;
    if text.len() <= max_chars {
        text.to_string()
    } else {
        let mut truncated = text.chars().take(max_chars).collect::<String>();
        truncated.push('\u{2026}');
        truncated
    }
}

pub struct CompressionService<'a> {
    config: CompressionConfig,
    provider: Option<&'a dyn CompletionProvider>,
}

impl<'a> CompressionService<'a> {
    pub fn new(config: CompressionConfig, provider: Option<&'a dyn CompletionProvider>) -> Self {
        Self { config, provider }
    }

    /// `papers` are assumed already deduped + prioritised (by the Federator).
    pub async fn compress(&self, papers: &[Paper], relevance_for: impl Fn(&Paper) -> String) -> Result<CompressionResult, CoreError> {
        let mut out = Vec::new();
        let mut total_tokens = 0usize;
        let mut original_chars = 0usize;

        for paper in papers {
            original_chars += paper.abstract_text.as_deref().unwrap_or("").len();

            let key_findings = self.key_findings(paper).await?;
            let compressed = CompressedPaper {
                title: paper.title.clone(),
                short_authors: short_authors(&paper.authors),
                year: paper.year,
                key_findings,
                methodology: paper.abstract_text.as_ref().and_then(|a| extract_methodology_hint(a)),
                relevance: relevance_for(paper),
                doi: paper.doi.clone(),
                citation_key: citation_key(paper),
            };

            let entry_tokens = estimate_tokens(&serde_json::to_string(&compressed).unwrap_or_default())
                .min(self.config.max_tokens_per_paper);

            if (total_tokens + entry_tokens) as f64 > 0.9 * self.config.max_total_tokens as f64 {
                break;
            }

            total_tokens += entry_tokens;
            out.push(compressed);
        }

        let compression_ratio = if original_chars == 0 {
            1.0
        } else {
            (total_tokens * 4) as f64 / original_chars as f64
        };

        Ok(CompressionResult {
            summary: summarize(&out),
            total_tokens_estimate: total_tokens,
            compression_ratio,
            papers: out,
        })
    }

    async fn key_findings(&self, paper: &Paper) -> Result<Vec<String>, CoreError> {
        let Some(abstract_text) = &paper.abstract_text else {
            return Ok(Vec::new());
        };
        if abstract_text.len() <= self.config.structured_generate_threshold_chars {
            return Ok(vec![truncate_to_tokens(abstract_text, self.config.max_tokens_per_paper)]);
        }
        let Some(provider) = self.provider else {
            return Ok(vec![truncate_to_tokens(abstract_text, self.config.max_tokens_per_paper)]);
        };
        let schema = serde_json::json!({
            "type": "object",
            "properties": { "findings": { "type": "array", "items": { "type": "string" }, "maxItems": 3 } },
            "required": ["findings"]
        });
        let prompt = format!("Extract up to 3 key findings from this abstract:\n\n{abstract_text}");
        let value = provider.structured_generate(&prompt, &schema).await?;
        let findings: Vec<String> = value
            .get("findings")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).take(3).collect())
            .unwrap_or_default();
        if findings.is_empty() {
            Ok(vec![truncate_to_tokens(abstract_text, self.config.max_tokens_per_paper)])
        } else {
            Ok(findings)
        }
    }
}

fn extract_methodology_hint(abstract_text: &str) -> Option<String> {
    let lowered = abstract_text.to_lowercase();
    const MARKERS: &[&str] = &["we propose", "we present", "method", "approach", "framework"];
    MARKERS.iter().find_map(|marker| {
        lowered.find(marker).map(|idx| {
            let end = (idx + 160).min(abstract_text.len());
            abstract_text[idx..end].to_string()
        })
    })
}

fn summarize(papers: &[CompressedPaper]) -> String {
    let names: Vec<&str> = papers.iter().take(5).map(|p| p.title.as_str()).collect();
    let years: Vec<u32> = papers.iter().filter_map(|p| p.year).collect();
    let range = match (years.iter().min(), years.iter().max()) {
        (Some(min), Some(max)) => format!(" ({min}-{max})"),
        _ => String::new(),
    };
    format!("{} papers{range}: {}", papers.len(), names.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::paper::{DataAvailability, SourceId};

    fn paper(title: &str, abstract_text: &str) -> Paper {
        Paper {
            id: title.to_string(),
            title: title.to_string(),
            authors: vec!["Jane Doe".into()],
            year: Some(2023),
            abstract_text: Some(abstract_text.to_string()),
            data_availability: DataAvailability::WithAbstract,
            source_origin: vec![SourceId::Core],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn short_abstracts_are_truncated_not_sent_to_llm() {
        let service = CompressionService::new(CompressionConfig::default(), None);
        let papers = vec![paper("Short Paper", "A short abstract.")];
        let result = service.compress(&papers, |_| "highly relevant".into()).await.unwrap();
        assert_eq!(result.papers.len(), 1);
        assert_eq!(result.papers[0].key_findings.len(), 1);
    }

    #[test]
    fn citation_key_uses_first_author_surname_and_year() {
        let p = paper("X", "y");
        assert_eq!(citation_key(&p), "doe2023");
    }
}
