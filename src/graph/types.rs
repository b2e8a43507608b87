use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque, comparable page identifier.
///
/// Wrapper around a string so the same identifier can be used as a store key,
/// a JSON map key, and a log field without conversions scattered around.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub String);

impl PageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shard identifiers are dense indexes assigned by the partitioner,
/// 0..total_shards.
pub type ShardId = u32;

/// A disjoint slice of the page set: the pages this shard owns, each with
/// its in-neighbor list.
///
/// `BTreeMap` keeps iteration order and the serialized form deterministic,
/// which makes recomputing an iteration from the same snapshot reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shard {
    pub id: ShardId,
    pub relations: BTreeMap<PageId, Vec<PageId>>,
}

impl Shard {
    pub fn page_count(&self) -> usize {
        self.relations.len()
    }
}

/// The one record per page held by the shared rank store.
///
/// Overwritten each iteration by the owning shard; never deleted. `prev_rank`
/// retains the immediately preceding iteration's value so a reader that
/// observes a record already advanced to its own iteration (a faster shard
/// got there first) can still consume the previous-iteration rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankRecord {
    pub page: PageId,
    /// Iteration this record's `rank` was computed at (0 = seed).
    pub iteration: u32,
    pub rank: f64,
    /// Rank from iteration - 1 (equal to `rank` at the seed).
    pub prev_rank: f64,
    /// Divisor other pages apply when consuming this page's rank: the page's
    /// out-degree. Fixed for the run; a zero weight means the page is never
    /// legitimately consumed as a neighbor.
    pub weight: u32,
}

impl RankRecord {
    /// Seed record for iteration 0: uniform rank 1/N.
    pub fn seed(page: PageId, page_count: usize, weight: u32) -> Self {
        let rank = 1.0 / page_count as f64;
        Self {
            page,
            iteration: 0,
            rank,
            prev_rank: rank,
            weight,
        }
    }
}

/// Fixed per-run iteration parameters, created once by the partitioner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IterationPlan {
    pub start_iter: u32,
    /// Last iteration to run, inclusive.
    pub end_iter: u32,
    pub damping: f64,
    /// Teleport contribution per page: (1 - damping) / N.
    pub leak: f64,
}

impl IterationPlan {
    pub fn new(end_iter: u32, damping: f64, page_count: usize) -> Self {
        Self {
            start_iter: 1,
            end_iter,
            damping,
            leak: (1.0 - damping) / page_count as f64,
        }
    }
}
