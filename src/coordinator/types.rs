use serde::{Deserialize, Serialize};

/// Per-iteration barrier state.
///
/// Transitions monotonically Pending -> PartiallyComplete -> Complete as
/// shards report; there is no way back within a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IterationStatus {
    /// No shard has reported this iteration yet.
    Pending,
    /// Some, but not all, shards have reported.
    PartiallyComplete { completed: usize, total: usize },
    /// Every shard has reported; iteration i+1 may start.
    Complete,
}

impl IterationStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, IterationStatus::Complete)
    }
}
