//! arXiv API client. The only source that speaks Atom/XML instead of JSon;
//! parsed with `quick-xml`, the XML crate the rest of the pack reaches for.

use async_trait::async_trait;
use serde::Deserialize;

use crate::cache::SearchOptions;
use crate::error::CoreError;
use crate::model::paper::{DataAvailability, Paper, SourceId};

use super::client::{RateGate, SearchResult, SourceClient};

const BASE_URL: &str = "http://export.arxiv.org/api/query";

pub struct ArxivClient {
    http: reqwest::Client,
    rate_gate: RateGate,
}

impl ArxivClient {
    pub fn new(http: reqwest::Client) -> Self {
        // arXiv asks callers to stay under one request every three seconds.
        Self {
            http,
            rate_gate: RateGate::new(1.0 / 3.0),
        }
    }
}

#[derive(Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Deserialize)]
struct Entry {
    id: String,
    title: String,
    #[serde(default)]
    summary: Option<String>,
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<Author>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    #[serde(rename = "primary_category")]
    primary_category: Option<PrimaryCategory>,
}

#[derive(Deserialize)]
struct Author {
    name: Option<String>,
}

#[derive(Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@title")]
    title: Option<String>,
}

#[derive(Deserialize)]
struct PrimaryCategory {
    #[serde(rename = "@term")]
    term: Option<String>,
}

fn arxiv_id_from_url(id_url: &str) -> String {
    id_url.rsplit('/').next().unwrap_or(id_url).to_string()
}

impl Entry {
    fn into_paper(self) -> Paper {
        let arxiv_id = arxiv_id_from_url(&self.id);
        let pdf_url = self
            .links
            .iter()
            .find(|l| l.title.as_deref() == Some("pdf"))
            .and_then(|l| l.href.clone());
        let year = self.published.as_deref().and_then(|p| p.get(0..4)).and_then(|y| y.parse().ok());
        let availability = if pdf_url.is_some() {
            DataAvailability::WithPdfLink
        } else if self.summary.is_some() {
            DataAvailability::WithAbstract
        } else {
            DataAvailability::MetadataOnly
        };
        Paper {
            id: format!("arxiv:{arxiv_id}"),
            title: self.title.split_whitespace().collect::<Vec<_>>().join(" "),
            authors: self.authors.into_iter().filter_map(|a| a.name).collect(),
            year,
            arxiv_id: Some(arxiv_id),
            subjects: self.primary_category.and_then(|c| c.term).into_iter().collect(),
            abstract_text: self.summary,
            pdf_url,
            data_availability: availability,
            source_origin: vec![SourceId::Arxiv],
            open_access: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SourceClient for ArxivClient {
    fn name(&self) -> &'static str {
        "arxiv"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn search(&self, query: &str, _options: &SearchOptions, limit: usize) -> Result<SearchResult, CoreError> {
        self.rate_gate.acquire().await;
        let response = self
            .http
            .get(BASE_URL)
            .query(&[
                ("search_query", format!("all:{query}")),
                ("start", "0".to_string()),
                ("max_results", limit.min(100).to_string()),
            ])
            .send()
            .await
            .map_err(|e| CoreError::network("arxiv", e.to_string()))?;

        if !response.status().is_success() {
            return Ok(SearchResult::default());
        }
        let body = response.text().await.map_err(|e| CoreError::network("arxiv", e.to_string()))?;
        let feed: Feed = quick_xml::de::from_str(&body).map_err(|e| CoreError::network("arxiv", e.to_string()))?;
        Ok(SearchResult {
            papers: feed.entries.into_iter().map(Entry::into_paper).collect(),
        })
    }

    async fn get_paper(&self, id: &str) -> Result<Option<Paper>, CoreError> {
        self.rate_gate.acquire().await;
        let response = self
            .http
            .get(BASE_URL)
            .query(&[("id_list", id)])
            .send()
            .await
            .map_err(|e| CoreError::network("arxiv", e.to_string()))?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let body = response.text().await.map_err(|e| CoreError::network("arxiv", e.to_string()))?;
        let feed: Feed = quick_xml::de::from_str(&body).map_err(|e| CoreError::network("arxiv", e.to_string()))?;
        Ok(feed.entries.into_iter().next().map(Entry::into_paper))
    }
}
