//! Bibliographic source clients: CORE, Semantic Scholar, OpenAlex, arXiv,
//! and PubMed, all behind the shared [`SourceClient`] contract so the
//! federator can treat them uniformly.

pub mod arxiv;
pub mod client;
pub mod core;
pub mod openalex;
pub mod pubmed;
pub mod semantic_scholar;

pub use arxiv::ArxivClient;
pub use client::{RateGate, SearchResult, SourceClient};
pub use core::CoreApiClient;
pub use openalex::OpenAlexClient;
pub use pubmed::PubMedClient;
pub use semantic_scholar::SemanticScholarClient;
