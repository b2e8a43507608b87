//! Barrier / Coordinator Module
//!
//! Tracks, per iteration, which shards have reported completion and gates
//! advancement: no shard may start iteration i+1 until every shard has
//! finished iteration i. Without this gate shards race arbitrarily far ahead
//! of one another and a page's update can mix neighbor values from different
//! iterations.
//!
//! ## Submodules
//! - **`barrier`**: The `IterationBarrier` state machine and the HTTP-backed
//!   `HttpCoordinator` used by remote workers.
//! - **`reconcile`**: The idempotent re-invoke-if-missing hook for shards
//!   that stalled (crashed worker, failed self-reinvocation).
//! - **`protocol`** / **`handlers`**: HTTP contract for boundary-crossing
//!   access to the barrier.

pub mod barrier;
pub mod handlers;
pub mod protocol;
pub mod reconcile;
pub mod types;


use crate::graph::types::ShardId;
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use types::IterationStatus;

/// The completion-tracking interface exposed to every worker and to the
/// partitioner. Boundary-crossing: implemented in-process by
/// `barrier::IterationBarrier` and over HTTP by `barrier::HttpCoordinator`.
pub trait Coordinator: Send + Sync + 'static {
    /// Resets completion state for a new run of `total_shards` shards.
    fn begin_run(&self, total_shards: usize) -> impl Future<Output = Result<()>> + Send;

    /// Records that a shard finished an iteration. Idempotent: duplicate
    /// reports (retried invocations) do not double-count.
    fn report_complete(
        &self,
        iteration: u32,
        shard: ShardId,
    ) -> impl Future<Output = Result<IterationStatus>> + Send;

    /// Whether every shard has reported the iteration. Iteration 0 is
    /// trivially complete (the seed records stand in for it).
    fn is_complete(&self, iteration: u32) -> impl Future<Output = Result<bool>> + Send;

    /// Shards that have not reported the iteration yet. This is the
    /// observable signal distinguishing a stalled shard from a slow one.
    fn missing_shards(&self, iteration: u32) -> impl Future<Output = Result<Vec<ShardId>>> + Send;
}

/// Blocks until the iteration is globally complete, polling with backoff.
///
/// This is the only suspension point a worker has besides store I/O.
pub async fn wait_for_iteration<C: Coordinator>(coordinator: &C, iteration: u32) -> Result<()> {
    let mut delay_ms = 50u64;

    loop {
        if coordinator.is_complete(iteration).await? {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        delay_ms = (delay_ms * 2).min(1000);
    }
}
