//! PubMed client via NCBI's E-utilities: `esearch` resolves a query to PMIDs,
//! `efetch` returns the full XML records for those PMIDs.

use async_trait::async_trait;
use serde::Deserialize;

use crate::cache::SearchOptions;
use crate::error::CoreError;
use crate::model::paper::{DataAvailability, Paper, SourceId};

use super::client::{RateGate, SearchResult, SourceClient};

const BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

pub struct PubMedClient {
    http: reqwest::Client,
    rate_gate: RateGate,
    api_key: Option<String>,
}

impl PubMedClient {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        let rps = if api_key.is_some() { 10.0 } else { 3.0 };
        Self {
            http,
            rate_gate: RateGate::new(rps),
            api_key,
        }
    }

    fn with_key<'a>(&'a self, mut params: Vec<(&'a str, String)>) -> Vec<(&'a str, String)> {
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }
}

#[derive(Deserialize)]
struct ESearchResult {
    esearchresult: ESearchInner,
}

#[derive(Deserialize)]
struct ESearchInner {
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Deserialize)]
struct PubmedArticleSet {
    #[serde(rename = "PubmedArticle", default)]
    articles: Vec<PubmedArticle>,
}

#[derive(Deserialize)]
struct PubmedArticle {
    #[serde(rename = "MedlineCitation")]
    medline_citation: MedlineCitation,
}

#[derive(Deserialize)]
struct MedlineCitation {
    #[serde(rename = "PMID")]
    pmid: RawPmid,
    #[serde(rename = "Article")]
    article: RawArticle,
}

#[derive(Deserialize)]
struct RawPmid {
    #[serde(rename = "$text")]
    value: String,
}

#[derive(Deserialize)]
struct RawArticle {
    #[serde(rename = "ArticleTitle")]
    title: Option<String>,
    #[serde(rename = "Abstract")]
    abstract_section: Option<RawAbstract>,
    #[serde(rename = "Journal")]
    journal: Option<RawJournal>,
    #[serde(rename = "AuthorList")]
    author_list: Option<RawAuthorList>,
    #[serde(rename = "ELocationID", default)]
    elocation_ids: Vec<RawELocationId>,
}

#[derive(Deserialize)]
struct RawAbstract {
    #[serde(rename = "AbstractText", default)]
    text: Vec<String>,
}

#[derive(Deserialize)]
struct RawJournal {
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "JournalIssue")]
    issue: Option<RawJournalIssue>,
}

#[derive(Deserialize)]
struct RawJournalIssue {
    #[serde(rename = "PubDate")]
    pub_date: Option<RawPubDate>,
}

#[derive(Deserialize)]
struct RawPubDate {
    #[serde(rename = "Year")]
    year: Option<u32>,
}

#[derive(Deserialize)]
struct RawAuthorList {
    #[serde(rename = "Author", default)]
    authors: Vec<RawAuthor>,
}

#[derive(Deserialize)]
struct RawAuthor {
    #[serde(rename = "LastName")]
    last_name: Option<String>,
    #[serde(rename = "ForeName")]
    fore_name: Option<String>,
}

#[derive(Deserialize)]
struct RawELocationId {
    #[serde(rename = "@EIdType")]
    id_type: Option<String>,
    #[serde(rename = "$text")]
    value: Option<String>,
}

impl PubmedArticle {
    fn into_paper(self) -> Paper {
        let article = self.medline_citation.article;
        let pmid = self.medline_citation.pmid.value;
        let abstract_text = article.abstract_section.map(|a| a.text.join(" "));
        let doi = article
            .elocation_ids
            .into_iter()
            .find(|e| e.id_type.as_deref() == Some("doi"))
            .and_then(|e| e.value);
        let authors = article
            .author_list
            .map(|l| {
                l.authors
                    .into_iter()
                    .map(|a| {
                        [a.fore_name, a.last_name]
                            .into_iter()
                            .flatten()
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let year = article
            .journal
            .as_ref()
            .and_then(|j| j.issue.as_ref())
            .and_then(|i| i.pub_date.as_ref())
            .and_then(|d| d.year);
        let availability = if abstract_text.is_some() {
            DataAvailability::WithAbstract
        } else {
            DataAvailability::MetadataOnly
        };
        Paper {
            id: doi.clone().unwrap_or_else(|| format!("pubmed:{pmid}")),
            title: article.title.unwrap_or_default(),
            authors,
            year,
            journal: article.journal.and_then(|j| j.title),
            doi,
            pmid: Some(pmid),
            abstract_text,
            data_availability: availability,
            source_origin: vec![SourceId::PubMed],
            ..Default::default()
        }
    }
}

#[async_trait]
impl SourceClient for PubMedClient {
    fn name(&self) -> &'static str {
        "pubmed"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn search(&self, query: &str, options: &SearchOptions, limit: usize) -> Result<SearchResult, CoreError> {
        self.rate_gate.acquire().await;

        let mut term = query.to_string();
        if let Some((from, to)) = options.year_range {
            term.push_str(&format!(" AND ({from}:{to}[dp])"));
        }

        let search_params = self.with_key(vec![
            ("db", "pubmed".to_string()),
            ("retmode", "json".to_string()),
            ("retmax", limit.min(200).to_string()),
            ("term", term),
        ]);
        let response = self
            .http
            .get(format!("{BASE_URL}/esearch.fcgi"))
            .query(&search_params)
            .send()
            .await
            .map_err(|e| CoreError::network("pubmed", e.to_string()))?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::RateLimit {
                source: "pubmed".into(),
                retry_after_ms: None,
            });
        }
        if !response.status().is_success() {
            return Ok(SearchResult::default());
        }
        let ids: ESearchResult = response.json().await.map_err(|e| CoreError::network("pubmed", e.to_string()))?;
        if ids.esearchresult.idlist.is_empty() {
            return Ok(SearchResult::default());
        }
        self.fetch_articles(&ids.esearchresult.idlist).await
    }

    async fn get_paper(&self, id: &str) -> Result<Option<Paper>, CoreError> {
        let result = self.fetch_articles(&[id.to_string()]).await?;
        Ok(result.papers.into_iter().next())
    }
}

impl PubMedClient {
    async fn fetch_articles(&self, ids: &[String]) -> Result<SearchResult, CoreError> {
        self.rate_gate.acquire().await;
        let fetch_params = self.with_key(vec![
            ("db", "pubmed".to_string()),
            ("retmode", "xml".to_string()),
            ("id", ids.join(",")),
        ]);
        let response = self
            .http
            .get(format!("{BASE_URL}/efetch.fcgi"))
            .query(&fetch_params)
            .send()
            .await
            .map_err(|e| CoreError::network("pubmed", e.to_string()))?;
        if !response.status().is_success() {
            return Ok(SearchResult::default());
        }
        let body = response.text().await.map_err(|e| CoreError::network("pubmed", e.to_string()))?;
        let parsed: PubmedArticleSet =
            quick_xml::de::from_str(&body).map_err(|e| CoreError::network("pubmed", e.to_string()))?;
        Ok(SearchResult {
            papers: parsed.articles.into_iter().map(PubmedArticle::into_paper).collect(),
        })
    }
}
