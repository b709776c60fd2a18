//! A concurrent, bounded LRU+TTL cache of [`Paper`] records shared across
//! sessions, grounded on the versioned-channel pattern in `state.rs`: a
//! single lock-guarded map with per-entry bookkeeping, generalized here into
//! an eviction policy instead of a version counter.

use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::model::paper::{DataAvailability, Paper};

#[derive(Clone, Debug)]
struct Entry {
    paper: Paper,
    inserted_at: Instant,
    last_access: Instant,
    access_count: u64,
}

#[derive(Clone, Copy, Debug)]
pub struct PaperCacheConfig {
    pub max_entries: usize,
    pub ttl: Duration,
    pub prefer_higher_availability: bool,
}

impl Default for PaperCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(24 * 3600),
            prefer_higher_availability: true,
        }
    }
}

#[derive(Default, Debug, Clone, Copy)]
pub struct PaperCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct PaperCache {
    config: PaperCacheConfig,
    entries: RwLock<FxHashMap<String, Entry>>,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl PaperCache {
    pub fn new(config: PaperCacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(FxHashMap::default()),
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }

    fn availability_weight(a: DataAvailability) -> u64 {
        match a {
            DataAvailability::MetadataOnly => 0,
            DataAvailability::WithAbstract => 1,
            DataAvailability::WithPdfLink => 2,
            DataAvailability::WithFullText => 3,
        }
    }

    fn score(&self, entry: &Entry, now: Instant) -> i64 {
        let age_secs = now.duration_since(entry.last_access).as_secs() as i64;
        let availability = if self.config.prefer_higher_availability {
            Self::availability_weight(entry.paper.data_availability) as i64 * 1000
        } else {
            0
        };
        availability - age_secs + 10_000 * entry.access_count as i64
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        now.duration_since(entry.inserted_at) > self.config.ttl
    }

    pub fn get(&self, id: &str) -> Option<Paper> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(id) {
            if self.is_expired(entry, now) {
                entries.remove(id);
                self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return None;
            }
        } else {
            self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return None;
        }
        let entry = entries.get_mut(id).expect("checked above");
        entry.last_access = now;
        entry.access_count += 1;
        self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Some(entry.paper.clone())
    }

    pub fn set(&self, paper: Paper) {
        let now = Instant::now();
        let mut entries = self.entries.write();
        self.cleanup_locked(&mut entries, now);

        if let Some(existing) = entries.get_mut(&paper.id) {
            if paper.data_availability > existing.paper.data_availability {
                existing.paper = paper;
            }
            existing.last_access = now;
            existing.access_count += 1;
            return;
        }

        if entries.len() >= self.config.max_entries {
            self.evict_one_locked(&mut entries, now);
        }

        entries.insert(
            paper.id.clone(),
            Entry {
                paper,
                inserted_at: now,
                last_access: now,
                access_count: 0,
            },
        );
    }

    pub fn update(&self, paper: Paper) {
        let now = Instant::now();
        let mut entries = self.entries.write();
        match entries.get_mut(&paper.id) {
            Some(existing) => {
                existing.paper.merge_from(paper);
                existing.last_access = now;
            }
            None => {
                drop(entries);
                self.set(paper);
            }
        }
    }

    fn evict_one_locked(&self, entries: &mut FxHashMap<String, Entry>, now: Instant) {
        if let Some((worst_key, _)) = entries
            .iter()
            .map(|(k, e)| (k.clone(), self.score(e, now)))
            .min_by_key(|(_, score)| *score)
        {
            entries.remove(&worst_key);
        }
    }

    fn cleanup_locked(&self, entries: &mut FxHashMap<String, Entry>, now: Instant) {
        entries.retain(|_, e| !self.is_expired(e, now));
    }

    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write();
        self.cleanup_locked(&mut entries, now);
    }

    pub fn stats(&self) -> PaperCacheStats {
        PaperCacheStats {
            hits: self.hits.load(std::sync::atomic::Ordering::Relaxed),
            misses: self.misses.load(std::sync::atomic::Ordering::Relaxed),
            entries: self.entries.read().len(),
        }
    }
}

impl Default for PaperCache {
    fn default() -> Self {
        Self::new(PaperCacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::paper::SourceId;

    fn paper(id: &str, availability: DataAvailability) -> Paper {
        Paper {
            id: id.to_string(),
            title: id.to_string(),
            data_availability: availability,
            source_origin: vec![SourceId::Core],
            ..Default::default()
        }
    }

    #[test]
    fn set_then_get_round_trips() {
        let cache = PaperCache::default();
        cache.set(paper("p1", DataAvailability::WithAbstract));
        let got = cache.get("p1").unwrap();
        assert_eq!(got.id, "p1");
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn set_does_not_downgrade_availability() {
        let cache = PaperCache::default();
        cache.set(paper("p1", DataAvailability::WithFullText));
        cache.set(paper("p1", DataAvailability::MetadataOnly));
        let got = cache.get("p1").unwrap();
        assert_eq!(got.data_availability, DataAvailability::WithFullText);
    }

    #[test]
    fn update_merges_sources() {
        let cache = PaperCache::default();
        let mut p2 = paper("p1", DataAvailability::MetadataOnly);
        p2.source_origin = vec![SourceId::Arxiv];
        cache.set(paper("p1", DataAvailability::MetadataOnly));
        cache.update(p2);
        let got = cache.get("p1").unwrap();
        assert_eq!(got.source_origin.len(), 2);
    }

    #[test]
    fn eviction_drops_lowest_scoring_entry_when_full() {
        let cache = PaperCache::new(PaperCacheConfig {
            max_entries: 2,
            ..PaperCacheConfig::default()
        });
        cache.set(paper("p1", DataAvailability::MetadataOnly));
        cache.set(paper("p2", DataAvailability::MetadataOnly));
        cache.set(paper("p3", DataAvailability::WithFullText));
        assert_eq!(cache.stats().entries, 2);
        assert!(cache.get("p3").is_some());
    }

    #[test]
    fn miss_on_unknown_id() {
        let cache = PaperCache::default();
        assert!(cache.get("nope").is_none());
        assert_eq!(cache.stats().misses, 1);
    }
}
