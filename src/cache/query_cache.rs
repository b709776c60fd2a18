//! Two-level query cache: a short-TTL global cache shared by all sessions,
//! and a longer-TTL per-session cache, per spec.md §4.2.

use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::cache::paper_cache::PaperCache;
use crate::model::paper::Paper;

fn normalize(query: &str) -> String {
    let mut tokens: Vec<String> = query
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    tokens.sort();
    tokens.join(" ")
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SearchOptions {
    pub year_range: Option<(u32, u32)>,
    pub open_access_only: bool,
}

impl SearchOptions {
    fn key(&self) -> String {
        format!(
            "{:?}-{}",
            self.year_range, self.open_access_only
        )
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
struct CacheKey(String);

impl CacheKey {
    fn build(query: &str, options: &SearchOptions) -> Self {
        CacheKey(format!("{}|{}", normalize(query), options.key()))
    }
}

struct CacheEntry {
    papers: Vec<Paper>,
    inserted_at: Instant,
}

struct TtlMap {
    ttl: Duration,
    entries: FxHashMap<CacheKey, CacheEntry>,
    order: Vec<CacheKey>,
    max_entries: usize,
}

impl TtlMap {
    fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            entries: FxHashMap::default(),
            order: Vec::new(),
            max_entries,
        }
    }

    fn get(&mut self, key: &CacheKey) -> Option<Vec<Paper>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if now.duration_since(entry.inserted_at) <= self.ttl {
                return Some(entry.papers.clone());
            }
            self.entries.remove(key);
        }
        None
    }

    fn set(&mut self, key: CacheKey, papers: Vec<Paper>) {
        if !self.entries.contains_key(&key) {
            if self.order.len() >= self.max_entries {
                let oldest = self.order.remove(0);
                self.entries.remove(&oldest);
            }
            self.order.push(key.clone());
        }
        self.entries.insert(
            key,
            CacheEntry {
                papers,
                inserted_at: Instant::now(),
            },
        );
    }
}

#[derive(Clone, Copy, Debug)]
pub struct QueryCacheConfig {
    pub global_ttl: Duration,
    pub global_max_entries: usize,
    pub session_ttl: Duration,
    pub session_max_entries: usize,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            global_ttl: Duration::from_secs(5 * 60),
            global_max_entries: 200,
            session_ttl: Duration::from_secs(30 * 60),
            session_max_entries: 200,
        }
    }
}

/// Global query cache, shared across sessions. Each session owns its own
/// short-lived [`SessionQueryCache`] layered in front of it.
pub struct QueryCache {
    config: QueryCacheConfig,
    global: RwLock<TtlMap>,
}

impl QueryCache {
    pub fn new(config: QueryCacheConfig) -> Self {
        Self {
            global: RwLock::new(TtlMap::new(config.global_ttl, config.global_max_entries)),
            config,
        }
    }

    pub fn get(&self, query: &str, options: &SearchOptions) -> Option<Vec<Paper>> {
        let key = CacheKey::build(query, options);
        self.global.write().get(&key)
    }

    pub fn set(&self, query: &str, options: &SearchOptions, papers: &[Paper], paper_cache: &PaperCache) {
        let key = CacheKey::build(query, options);
        self.global.write().set(key, papers.to_vec());
        for paper in papers {
            paper_cache.set(paper.clone());
        }
    }

    pub fn session_cache(&self) -> SessionQueryCache {
        SessionQueryCache {
            ttl: TtlMap::new(self.config.session_ttl, self.config.session_max_entries),
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(QueryCacheConfig::default())
    }
}

/// Session-scoped query cache, checked before falling back to the global
/// cache (spec.md §4.2: "session cache first, longer TTL").
pub struct SessionQueryCache {
    ttl: TtlMap,
}

impl SessionQueryCache {
    pub fn get(&mut self, query: &str, options: &SearchOptions) -> Option<Vec<Paper>> {
        let key = CacheKey::build(query, options);
        self.ttl.get(&key)
    }

    pub fn set(&mut self, query: &str, options: &SearchOptions, papers: Vec<Paper>) {
        let key = CacheKey::build(query, options);
        self.ttl.set(key, papers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_ignores_case_whitespace_and_order() {
        assert_eq!(normalize("Deep  Learning!"), normalize("learning deep"));
    }

    #[test]
    fn global_cache_round_trips() {
        let cache = QueryCache::default();
        let paper_cache = PaperCache::default();
        let options = SearchOptions::default();
        let papers = vec![Paper { id: "p1".into(), ..Default::default() }];
        cache.set("quantum computing", &options, &papers, &paper_cache);
        let got = cache.get("Quantum   Computing", &options).unwrap();
        assert_eq!(got.len(), 1);
        assert!(paper_cache.get("p1").is_some());
    }

    #[test]
    fn session_cache_is_independent_of_global() {
        let cache = QueryCache::default();
        let mut session = cache.session_cache();
        let options = SearchOptions::default();
        session.set("topic", &options, vec![Paper { id: "p1".into(), ..Default::default() }]);
        assert!(session.get("topic", &options).is_some());
        assert!(cache.get("topic", &options).is_none());
    }
}
