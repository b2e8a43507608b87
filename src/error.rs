//! Protocol Failure Taxonomy
//!
//! Classifies the failure modes of the distributed iteration protocol.
//! Only `PartitionInconsistency` is fatal; the other variants are retried,
//! contained, or surfaced as degraded behavior by the component that hits them.

use crate::graph::types::ShardId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A page landed in zero or multiple shards. Detected before iteration 1
    /// starts and aborts the run.
    #[error("partition inconsistency: page '{page}' assigned to {count} shards")]
    PartitionInconsistency { page: String, count: usize },

    /// A store get/put failed after retries were exhausted. The owning page's
    /// computation for the iteration fails and is retried at shard granularity.
    #[error("store unavailable after {attempts} attempts: {reason}")]
    StoreUnavailable { attempts: usize, reason: String },

    /// A worker could not submit its own continuation. The shard is stalled
    /// until the reconciliation hook re-invokes it.
    #[error("invocation for shard {shard} failed to submit: {reason}")]
    InvocationFailure { shard: ShardId, reason: String },

    /// A neighbor's rank record was absent from the rank store. Non-fatal:
    /// the neighbor contributes zero and the read is counted as degraded.
    #[error("no rank record for neighbor '{neighbor}' of page '{page}'")]
    MissingNeighborRecord { page: String, neighbor: String },
}
