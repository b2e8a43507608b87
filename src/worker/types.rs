use crate::graph::types::ShardId;
use serde::{Deserialize, Serialize};

/// Locates one shard's relation map in the object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardRef {
    pub shard_id: ShardId,
    pub bucket: String,
    pub relation_key: String,
}

/// The complete input of one worker execution.
///
/// Carries the iteration plan so a worker needs no other run state;
/// `current_iter` starts at 1 and the run ends after `end_iter` inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPayload {
    /// Run identifier stamped by the partitioner, carried for log correlation.
    pub run_id: String,
    pub current_iter: u32,
    pub end_iter: u32,
    pub damping: f64,
    /// Teleport contribution per page: (1 - damping) / N.
    pub leak: f64,
    pub shard: ShardRef,
}

impl WorkerPayload {
    /// The continuation payload a worker submits once the barrier releases
    /// its current iteration.
    pub fn next_iteration(&self) -> Self {
        let mut next = self.clone();
        next.current_iter += 1;
        next
    }

    /// Copy of this payload retargeted at an arbitrary iteration, used by
    /// the reconciliation hook.
    pub fn at_iteration(&self, iteration: u32) -> Self {
        let mut copy = self.clone();
        copy.current_iter = iteration;
        copy
    }
}

/// Outcome of processing one shard for one iteration, logged by the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardReport {
    pub shard_id: ShardId,
    pub iteration: u32,
    pub pages_processed: usize,
    /// Pages whose computation failed (store errors after retries). These are
    /// recovered by re-running the shard, not silently dropped.
    pub pages_failed: usize,
    /// Neighbor lookups that found no record and contributed zero.
    pub degraded_reads: usize,
    pub elapsed_ms: u64,
}

impl ShardReport {
    pub fn new(shard_id: ShardId, iteration: u32) -> Self {
        Self {
            shard_id,
            iteration,
            pages_processed: 0,
            pages_failed: 0,
            degraded_reads: 0,
            elapsed_ms: 0,
        }
    }
}
