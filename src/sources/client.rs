//! The `SourceClient` contract every bibliographic source implements, plus
//! the shared rate-gate and result shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::SearchOptions;
use crate::error::CoreError;
use crate::model::paper::Paper;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchResult {
    pub papers: Vec<Paper>,
}

/// A single bibliographic source: CORE, Semantic Scholar, OpenAlex, arXiv,
/// or PubMed. Implementations never let a transport failure propagate as a
/// terminal error — per spec.md §7, federation always returns a (possibly
/// empty) result and logs the failure.
#[async_trait]
pub trait SourceClient: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap availability probe; `false` after any transport error.
    async fn is_available(&self) -> bool;

    async fn search(&self, query: &str, options: &SearchOptions, limit: usize) -> Result<SearchResult, CoreError>;

    async fn get_paper(&self, id: &str) -> Result<Option<Paper>, CoreError>;
}

/// A single-permit interval gate: at most one outbound request leaves every
/// `1 / requests_per_second`. Grounded on the async-primitive vocabulary
/// `tokio::time::interval` already used throughout the event bus, adapted
/// here from broadcast backpressure to outbound throttling.
pub struct RateGate {
    interval: tokio::sync::Mutex<tokio::time::Interval>,
}

impl RateGate {
    pub fn new(requests_per_second: f64) -> Self {
        let period = std::time::Duration::from_secs_f64((1.0 / requests_per_second.max(0.001)).min(3600.0));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        Self {
            interval: tokio::sync::Mutex::new(interval),
        }
    }

    pub async fn acquire(&self) {
        self.interval.lock().await.tick().await;
    }
}
