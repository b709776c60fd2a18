//! CORE (core.ac.uk) API client.

use async_trait::async_trait;
use serde::Deserialize;

use crate::cache::SearchOptions;
use crate::error::CoreError as AppError;
use crate::model::paper::{DataAvailability, Paper, SourceId};

use super::client::{RateGate, SearchResult, SourceClient};

const BASE_URL: &str = "https://api.core.ac.uk/v3";

pub struct CoreApiClient {
    http: reqwest::Client,
    rate_gate: RateGate,
    api_key: Option<String>,
}

impl CoreApiClient {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            http,
            rate_gate: RateGate::new(if api_key.is_some() { 10.0 } else { 0.3 }),
            api_key,
        }
    }
}

#[derive(Deserialize, Default)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawWork>,
}

#[derive(Deserialize)]
struct RawWork {
    id: Option<i64>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "yearPublished")]
    year_published: Option<u32>,
    #[serde(default)]
    authors: Vec<RawAuthor>,
    #[serde(rename = "publisher")]
    publisher: Option<String>,
    doi: Option<String>,
    #[serde(rename = "downloadUrl")]
    download_url: Option<String>,
    #[serde(rename = "fullText")]
    full_text: Option<String>,
    #[serde(default)]
    subjects: Vec<String>,
    #[serde(rename = "citationCount")]
    citation_count: Option<u32>,
}

#[derive(Deserialize)]
struct RawAuthor {
    name: Option<String>,
}

impl RawWork {
    fn into_paper(self) -> Paper {
        let has_full_text = self.full_text.is_some();
        let has_pdf = self.download_url.is_some();
        let has_abstract = self.abstract_text.is_some();
        let availability = if has_full_text {
            DataAvailability::WithFullText
        } else if has_pdf {
            DataAvailability::WithPdfLink
        } else if has_abstract {
            DataAvailability::WithAbstract
        } else {
            DataAvailability::MetadataOnly
        };
        Paper {
            id: self
                .doi
                .clone()
                .unwrap_or_else(|| format!("core:{}", self.id.unwrap_or_default())),
            title: self.title.unwrap_or_default(),
            authors: self.authors.into_iter().filter_map(|a| a.name).collect(),
            year: self.year_published,
            journal: self.publisher,
            doi: self.doi,
            subjects: self.subjects,
            abstract_text: self.abstract_text,
            pdf_url: self.download_url,
            full_text: self.full_text,
            data_availability: availability,
            source_origin: vec![SourceId::Core],
            citations: self.citation_count,
            open_access: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SourceClient for CoreApiClient {
    fn name(&self) -> &'static str {
        "core"
    }

    async fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &str, options: &SearchOptions, limit: usize) -> Result<SearchResult, AppError> {
        if self.api_key.is_none() {
            return Ok(SearchResult::default());
        }
        self.rate_gate.acquire().await;

        let mut q = query.to_string();
        if let Some((from, to)) = options.year_range {
            q.push_str(&format!(" AND yearPublished>={from} AND yearPublished<={to}"));
        }

        let response = self
            .http
            .get(format!("{BASE_URL}/search/works"))
            .bearer_auth(self.api_key.as_ref().unwrap())
            .query(&[("q", q.as_str()), ("limit", &limit.min(100).to_string())])
            .send()
            .await
            .map_err(|e| AppError::network("core", e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimit {
                source: "core".into(),
                retry_after_ms: None,
            });
        }
        if !response.status().is_success() {
            return Ok(SearchResult::default());
        }
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::network("core", e.to_string()))?;
        Ok(SearchResult {
            papers: parsed.results.into_iter().map(RawWork::into_paper).collect(),
        })
    }

    async fn get_paper(&self, id: &str) -> Result<Option<Paper>, AppError> {
        if self.api_key.is_none() {
            return Ok(None);
        }
        self.rate_gate.acquire().await;
        let response = self
            .http
            .get(format!("{BASE_URL}/works/{id}"))
            .bearer_auth(self.api_key.as_ref().unwrap())
            .send()
            .await
            .map_err(|e| AppError::network("core", e.to_string()))?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let raw: RawWork = response
            .json()
            .await
            .map_err(|e| AppError::network("core", e.to_string()))?;
        Ok(Some(raw.into_paper()))
    }
}
