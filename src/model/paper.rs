//! The canonical bibliographic record and its identity/merge rules.

use serde::{Deserialize, Serialize};

/// How much content a source actually gave us for a paper.
///
/// Ordered: a merge always keeps the higher variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataAvailability {
    MetadataOnly,
    WithAbstract,
    WithPdfLink,
    WithFullText,
}

/// A bibliographic source that contributed to a [`Paper`] record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    Core,
    SemanticScholar,
    OpenAlex,
    Arxiv,
    PubMed,
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourceId::Core => "core",
            SourceId::SemanticScholar => "semantic_scholar",
            SourceId::OpenAlex => "openalex",
            SourceId::Arxiv => "arxiv",
            SourceId::PubMed => "pubmed",
        };
        write!(f, "{s}")
    }
}

/// The canonical bibliographic record produced by federated search.
///
/// `id` is stable within a session: derived from `doi` when present
/// (case-insensitive, with any `https://doi.org/` prefix stripped), else
/// from a source-prefixed native identifier.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<u32>,
    pub journal: Option<String>,
    pub venue: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub pmid: Option<String>,
    pub subjects: Vec<String>,
    #[serde(default)]
    pub data_availability: DataAvailability,
    pub abstract_text: Option<String>,
    pub pdf_url: Option<String>,
    pub full_text: Option<String>,
    pub source_origin: Vec<SourceId>,
    pub citations: Option<u32>,
    pub open_access: bool,
}

impl Default for DataAvailability {
    fn default() -> Self {
        DataAvailability::MetadataOnly
    }
}

fn normalize_doi(doi: &str) -> String {
    doi.trim()
        .trim_start_matches("https://doi.org/")
        .trim_start_matches("http://doi.org/")
        .trim_start_matches("doi:")
        .to_lowercase()
}

fn normalize_title(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
        .chars()
        .take(50)
        .collect()
}

impl Paper {
    /// Canonical merge key: DOI when present, else a normalized title key.
    pub fn canonical_key(&self) -> String {
        match &self.doi {
            Some(doi) if !doi.trim().is_empty() => format!("doi:{}", normalize_doi(doi)),
            _ => format!("title:{}", normalize_title(&self.title)),
        }
    }

    /// Merge another observation of the same paper into `self`, keeping the
    /// higher [`DataAvailability`], the union of sources/subjects, and the
    /// max citation count.
    pub fn merge_from(&mut self, other: Paper) {
        if other.data_availability > self.data_availability {
            if other.abstract_text.is_some() {
                self.abstract_text = other.abstract_text;
            }
            if other.pdf_url.is_some() {
                self.pdf_url = other.pdf_url;
            }
            if other.full_text.is_some() {
                self.full_text = other.full_text;
            }
            self.doi = other.doi.or(self.doi.take());
            self.arxiv_id = other.arxiv_id.or(self.arxiv_id.take());
            self.pmid = other.pmid.or(self.pmid.take());
            self.journal = other.journal.or(self.journal.take());
            self.venue = other.venue.or(self.venue.take());
            self.volume = other.volume.or(self.volume.take());
            self.issue = other.issue.or(self.issue.take());
            self.pages = other.pages.or(self.pages.take());
            if other.year.is_some() {
                self.year = other.year;
            }
            self.data_availability = other.data_availability;
        } else {
            self.abstract_text = self.abstract_text.take().or(other.abstract_text);
            self.pdf_url = self.pdf_url.take().or(other.pdf_url);
            self.full_text = self.full_text.take().or(other.full_text);
            self.doi = self.doi.take().or(other.doi);
            self.arxiv_id = self.arxiv_id.take().or(other.arxiv_id);
            self.pmid = self.pmid.take().or(other.pmid);
            self.journal = self.journal.take().or(other.journal);
            self.venue = self.venue.take().or(other.venue);
            self.volume = self.volume.take().or(other.volume);
            self.issue = self.issue.take().or(other.issue);
            self.pages = self.pages.take().or(other.pages);
            if self.year.is_none() {
                self.year = other.year;
            }
        }

        for src in other.source_origin {
            if !self.source_origin.contains(&src) {
                self.source_origin.push(src);
            }
        }
        for subj in other.subjects {
            if !self.subjects.contains(&subj) {
                self.subjects.push(subj);
            }
        }

        self.citations = match (self.citations, other.citations) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.open_access = self.open_access || other.open_access;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(doi: Option<&str>, title: &str, availability: DataAvailability) -> Paper {
        Paper {
            title: title.to_string(),
            doi: doi.map(str::to_string),
            data_availability: availability,
            source_origin: vec![SourceId::Core],
            ..Default::default()
        }
    }

    #[test]
    fn canonical_key_prefers_doi_case_insensitively() {
        let a = paper(Some("10.1/ABC"), "title a", DataAvailability::MetadataOnly);
        let b = paper(
            Some("https://doi.org/10.1/abc"),
            "title b",
            DataAvailability::MetadataOnly,
        );
        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn canonical_key_falls_back_to_normalized_title() {
        let a = paper(None, "A Study Of Things!", DataAvailability::MetadataOnly);
        let b = paper(None, "a study of things", DataAvailability::MetadataOnly);
        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn merge_keeps_higher_availability_and_unions_sources() {
        let mut a = paper(Some("10.1/x"), "x", DataAvailability::MetadataOnly);
        let mut b = paper(Some("10.1/x"), "x", DataAvailability::WithFullText);
        b.source_origin = vec![SourceId::Arxiv];
        b.full_text = Some("full text".into());
        a.merge_from(b);
        assert_eq!(a.data_availability, DataAvailability::WithFullText);
        assert_eq!(a.full_text.as_deref(), Some("full text"));
        assert_eq!(a.source_origin.len(), 2);
    }
}
