//! OpenAlex API client. Polite-pool access keyed off a contact email rather
//! than an API key: no email means the shared, more aggressively throttled
//! pool.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::cache::SearchOptions;
use crate::error::CoreError;
use crate::model::paper::{DataAvailability, Paper, SourceId};

use super::client::{RateGate, SearchResult, SourceClient};

const BASE_URL: &str = "https://api.openalex.org/works";

pub struct OpenAlexClient {
    http: reqwest::Client,
    rate_gate: RateGate,
    mailto: Option<String>,
}

impl OpenAlexClient {
    pub fn new(http: reqwest::Client, mailto: Option<String>) -> Self {
        let rps = if mailto.is_some() { 10.0 } else { 3.0 };
        Self {
            http,
            rate_gate: RateGate::new(rps),
            mailto,
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
    id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    authorships: Vec<RawAuthorship>,
    publication_year: Option<u32>,
    doi: Option<String>,
    primary_location: Option<RawLocation>,
    open_access: Option<RawOpenAccess>,
    cited_by_count: Option<u32>,
    #[serde(rename = "abstract_inverted_index")]
    abstract_inverted_index: Option<BTreeMap<String, Vec<u32>>>,
    #[serde(default)]
    concepts: Vec<RawConcept>,
}

#[derive(Deserialize)]
struct RawAuthorship {
    author: Option<RawAuthor>,
}

#[derive(Deserialize)]
struct RawAuthor {
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct RawLocation {
    source: Option<RawSource>,
    pdf_url: Option<String>,
}

#[derive(Deserialize)]
struct RawSource {
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct RawOpenAccess {
    is_oa: Option<bool>,
    oa_url: Option<String>,
}

#[derive(Deserialize)]
struct RawConcept {
    display_name: Option<String>,
}

fn reconstruct_abstract(index: &BTreeMap<String, Vec<u32>>) -> String {
    let mut positions: Vec<(u32, &str)> = Vec::new();
    for (word, locs) in index {
        for &pos in locs {
            positions.push((pos, word.as_str()));
        }
    }
    positions.sort_by_key(|(pos, _)| *pos);
    positions.into_iter().map(|(_, w)| w).collect::<Vec<_>>().join(" ")
}

impl RawWork {
    fn into_paper(self) -> Paper {
        let abstract_text = self.abstract_inverted_index.as_ref().map(reconstruct_abstract);
        let pdf_url = self
            .primary_location
            .as_ref()
            .and_then(|l| l.pdf_url.clone())
            .or_else(|| self.open_access.as_ref().and_then(|oa| oa.oa_url.clone()));
        let open_access = self.open_access.as_ref().and_then(|oa| oa.is_oa).unwrap_or(false);
        let availability = if pdf_url.is_some() {
            DataAvailability::WithPdfLink
        } else if abstract_text.is_some() {
            DataAvailability::WithAbstract
        } else {
            DataAvailability::MetadataOnly
        };
        Paper {
            id: self
                .doi
                .clone()
                .unwrap_or_else(|| format!("openalex:{}", self.id.clone().unwrap_or_default())),
            title: self.title.unwrap_or_default(),
            authors: self
                .authorships
                .into_iter()
                .filter_map(|a| a.author.and_then(|au| au.display_name))
                .collect(),
            year: self.publication_year,
            venue: self.primary_location.and_then(|l| l.source).and_then(|s| s.display_name),
            doi: self.doi,
            subjects: self.concepts.into_iter().filter_map(|c| c.display_name).collect(),
            abstract_text,
            pdf_url,
            data_availability: availability,
            source_origin: vec![SourceId::OpenAlex],
            citations: self.cited_by_count,
            open_access,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SourceClient for OpenAlexClient {
    fn name(&self) -> &'static str {
        "openalex"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn search(&self, query: &str, options: &SearchOptions, limit: usize) -> Result<SearchResult, CoreError> {
        self.rate_gate.acquire().await;
        let mut filters = Vec::new();
        if let Some((from, to)) = options.year_range {
            filters.push(format!("publication_year:{from}-{to}"));
        }
        if options.open_access_only {
            filters.push("open_access.is_oa:true".to_string());
        }

        let mut req = self.http.get(BASE_URL).query(&[
            ("search", query.to_string()),
            ("per-page", limit.min(200).to_string()),
        ]);
        if !filters.is_empty() {
            req = req.query(&[("filter", filters.join(","))]);
        }
        if let Some(mailto) = &self.mailto {
            req = req.query(&[("mailto", mailto.as_str())]);
        }

        let response = req.send().await.map_err(|e| CoreError::network("openalex", e.to_string()))?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::RateLimit {
                source: "openalex".into(),
                retry_after_ms: None,
            });
        }
        if !response.status().is_success() {
            return Ok(SearchResult::default());
        }
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| CoreError::network("openalex", e.to_string()))?;
        Ok(SearchResult {
            papers: parsed.results.into_iter().map(RawWork::into_paper).collect(),
        })
    }

    async fn get_paper(&self, id: &str) -> Result<Option<Paper>, CoreError> {
        self.rate_gate.acquire().await;
        let mut req = self.http.get(format!("{BASE_URL}/{id}"));
        if let Some(mailto) = &self.mailto {
            req = req.query(&[("mailto", mailto.as_str())]);
        }
        let response = req.send().await.map_err(|e| CoreError::network("openalex", e.to_string()))?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let raw: RawWork = response
            .json()
            .await
            .map_err(|e| CoreError::network("openalex", e.to_string()))?;
        Ok(Some(raw.into_paper()))
    }
}
