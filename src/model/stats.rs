//! `ResearchMemory::get_stats()` return shape.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    pub paper_count: usize,
    pub round_count: usize,
    pub citation_count: usize,
    pub open_gap_count: usize,
    pub addressed_gap_count: usize,
    pub iteration: u32,
    pub elapsed_ms: i64,
}
