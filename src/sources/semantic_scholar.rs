//! Semantic Scholar Graph API client.

use async_trait::async_trait;
use serde::Deserialize;

use crate::cache::SearchOptions;
use crate::error::CoreError;
use crate::model::paper::{DataAvailability, Paper, SourceId};

use super::client::{RateGate, SearchResult, SourceClient};

const BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";
const FIELDS: &str = "title,abstract,year,authors,venue,externalIds,citationCount,openAccessPdf,publicationVenue";

pub struct SemanticScholarClient {
    http: reqwest::Client,
    rate_gate: RateGate,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        let rps = if api_key.is_some() { 10.0 } else { 1.0 };
        Self {
            http,
            rate_gate: RateGate::new(rps),
            api_key,
        }
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .header("User-Agent", "citeweave-research-bot/0.1 (contact: research@example.com)");
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }
        req
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<RawPaper>,
}

#[derive(Deserialize)]
struct RawPaper {
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<u32>,
    #[serde(default)]
    authors: Vec<RawAuthor>,
    venue: Option<String>,
    #[serde(rename = "externalIds", default)]
    external_ids: RawExternalIds,
    #[serde(rename = "citationCount")]
    citation_count: Option<u32>,
    #[serde(rename = "openAccessPdf")]
    open_access_pdf: Option<RawPdf>,
}

#[derive(Deserialize, Default)]
struct RawAuthor {
    name: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "ArXiv")]
    arxiv: Option<String>,
    #[serde(rename = "PubMed")]
    pubmed: Option<String>,
}

#[derive(Deserialize)]
struct RawPdf {
    url: Option<String>,
}

impl RawPaper {
    fn into_paper(self) -> Paper {
        let has_abstract = self.abstract_text.is_some();
        let has_pdf = self.open_access_pdf.as_ref().and_then(|p| p.url.as_ref()).is_some();
        let availability = if has_pdf {
            DataAvailability::WithPdfLink
        } else if has_abstract {
            DataAvailability::WithAbstract
        } else {
            DataAvailability::MetadataOnly
        };
        Paper {
            id: self
                .external_ids
                .doi
                .clone()
                .unwrap_or_else(|| format!("semantic_scholar:{}", self.title.clone().unwrap_or_default())),
            title: self.title.unwrap_or_default(),
            authors: self.authors.into_iter().filter_map(|a| a.name).collect(),
            year: self.year,
            venue: self.venue,
            doi: self.external_ids.doi,
            arxiv_id: self.external_ids.arxiv,
            pmid: self.external_ids.pubmed,
            abstract_text: self.abstract_text,
            pdf_url: self.open_access_pdf.and_then(|p| p.url),
            data_availability: availability,
            source_origin: vec![SourceId::SemanticScholar],
            citations: self.citation_count,
            open_access: has_pdf,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SourceClient for SemanticScholarClient {
    fn name(&self) -> &'static str {
        "semantic_scholar"
    }

    async fn is_available(&self) -> bool {
        self.rate_gate.acquire().await;
        self.request(&format!("{BASE_URL}/paper/search?query=test&limit=1"))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn search(&self, query: &str, _options: &SearchOptions, limit: usize) -> Result<SearchResult, CoreError> {
        self.rate_gate.acquire().await;
        let url = format!(
            "{BASE_URL}/paper/search?query={}&limit={}&fields={FIELDS}",
            urlencode(query),
            limit.min(100)
        );
        let response = self
            .request(&url)
            .send()
            .await
            .map_err(|e| CoreError::network("semantic_scholar", e.to_string()))?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::RateLimit {
                source: "semantic_scholar".into(),
                retry_after_ms: None,
            });
        }
        if !response.status().is_success() {
            return Ok(SearchResult::default());
        }
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| CoreError::network("semantic_scholar", e.to_string()))?;
        Ok(SearchResult {
            papers: parsed.data.into_iter().map(RawPaper::into_paper).collect(),
        })
    }

    async fn get_paper(&self, id: &str) -> Result<Option<Paper>, CoreError> {
        self.rate_gate.acquire().await;
        let url = format!("{BASE_URL}/paper/{id}?fields={FIELDS}");
        let response = self
            .request(&url)
            .send()
            .await
            .map_err(|e| CoreError::network("semantic_scholar", e.to_string()))?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let raw: RawPaper = response
            .json()
            .await
            .map_err(|e| CoreError::network("semantic_scholar", e.to_string()))?;
        Ok(Some(raw.into_paper()))
    }
}

fn urlencode(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_string()
            } else {
                format!("%{:02X}", c as u32)
            }
        })
        .collect()
}
