//! Shared, cross-session caching layer: a bounded LRU+TTL [`Paper`](crate::model::paper::Paper)
//! cache and a two-level query cache layered in front of federated search.

pub mod paper_cache;
pub mod query_cache;

pub use paper_cache::{PaperCache, PaperCacheConfig, PaperCacheStats};
pub use query_cache::{QueryCache, QueryCacheConfig, SearchOptions, SessionQueryCache};
