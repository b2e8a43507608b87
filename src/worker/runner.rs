//! Worker Lifecycle
//!
//! `WorkerContext` bundles the interfaces one worker execution needs; `run`
//! drives a single shard through a single iteration and decides how to
//! advance. The dispatch loop turns locally-invoked payloads into spawned
//! executions, mirroring what an external invoker does for remote nodes.

use super::invoker::{Invoker, invoke_with_retry};
use super::ranker;
use super::types::WorkerPayload;
use crate::coordinator::{Coordinator, wait_for_iteration};
use crate::graph::types::{PageId, Shard};
use crate::store::object::ObjectStore;
use crate::store::rank::RankStore;

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Number of submission attempts for a worker's own continuation.
const REINVOKE_ATTEMPTS: usize = 3;

pub struct WorkerContext<S, O, C, I> {
    rank_store: Arc<S>,
    object_store: Arc<O>,
    coordinator: Arc<C>,
    invoker: Arc<I>,
}

impl<S, O, C, I> WorkerContext<S, O, C, I>
where
    S: RankStore,
    O: ObjectStore,
    C: Coordinator,
    I: Invoker,
{
    pub fn new(
        rank_store: Arc<S>,
        object_store: Arc<O>,
        coordinator: Arc<C>,
        invoker: Arc<I>,
    ) -> Arc<Self> {
        Arc::new(Self {
            rank_store,
            object_store,
            coordinator,
            invoker,
        })
    }

    /// Executes one shard for one iteration, reports completion, and submits
    /// the continuation once the barrier releases the iteration.
    ///
    /// Completion is only reported when every page in the shard processed;
    /// a shard with failed pages stays unreported so reconciliation
    /// re-invokes it instead of the run finishing over stale records.
    pub async fn run(&self, payload: WorkerPayload) -> Result<()> {
        let shard_id = payload.shard.shard_id;

        // Iteration numbering starts at 1; iteration 0 belongs to the seed
        // records and is never executed.
        if payload.current_iter == 0 {
            anyhow::bail!(
                "rejected payload for shard {}: iteration numbering starts at 1",
                shard_id
            );
        }

        // Never read neighbors before the previous iteration is globally
        // complete. Iteration 0 is satisfied by the seed records.
        wait_for_iteration(&*self.coordinator, payload.current_iter - 1).await?;

        let shard = self.load_shard(&payload).await?;
        tracing::debug!(
            "Shard {} starting iteration {} ({} pages, run {})",
            shard_id,
            payload.current_iter,
            shard.page_count(),
            payload.run_id
        );

        let report = ranker::process_shard(&*self.rank_store, &shard, &payload).await;
        tracing::info!(
            "Shard {} iteration {}: {} pages, {} failed, {} degraded reads, {} ms",
            report.shard_id,
            report.iteration,
            report.pages_processed,
            report.pages_failed,
            report.degraded_reads,
            report.elapsed_ms
        );

        // A shard with failed pages must not report: reporting would release
        // the barrier with stale records behind it. Withholding the report
        // leaves the shard in the coordinator's missing set, and the
        // reconciliation re-invoke recomputes it (idempotent for the pages
        // that did succeed).
        if report.pages_failed > 0 {
            anyhow::bail!(
                "shard {} left {} pages unprocessed at iteration {}, withholding completion report",
                shard_id,
                report.pages_failed,
                payload.current_iter
            );
        }

        self.coordinator
            .report_complete(payload.current_iter, shard_id)
            .await?;

        if payload.current_iter >= payload.end_iter {
            tracing::info!(
                "Shard {} finished the run at iteration {} (run {})",
                shard_id,
                payload.current_iter,
                payload.run_id
            );
            return Ok(());
        }

        // Block until every shard has finished this iteration, then hand the
        // next one to the invoker. A submission failure here stalls the
        // shard; the coordinator's missing-shard accounting makes that
        // visible and reconciliation re-invokes it.
        wait_for_iteration(&*self.coordinator, payload.current_iter).await?;

        let next = payload.next_iteration();
        if let Err(e) = invoke_with_retry(&*self.invoker, next, REINVOKE_ATTEMPTS).await {
            tracing::error!(
                "Shard {} stalled after iteration {}: {}",
                shard_id,
                payload.current_iter,
                e
            );
            return Err(e);
        }

        Ok(())
    }

    async fn load_shard(&self, payload: &WorkerPayload) -> Result<Shard> {
        let raw = self
            .object_store
            .get(&payload.shard.bucket, &payload.shard.relation_key)
            .await
            .with_context(|| format!("loading relations for shard {}", payload.shard.shard_id))?;

        let relations: BTreeMap<PageId, Vec<PageId>> = serde_json::from_slice(&raw)
            .with_context(|| format!("parsing relations for shard {}", payload.shard.shard_id))?;

        Ok(Shard {
            id: payload.shard.shard_id,
            relations,
        })
    }
}

/// Spawns the dispatch loop: every payload received from a `LocalInvoker`
/// becomes an independent worker execution.
pub fn spawn_dispatcher<S, O, C, I>(
    ctx: Arc<WorkerContext<S, O, C, I>>,
    mut rx: mpsc::UnboundedReceiver<WorkerPayload>,
) -> tokio::task::JoinHandle<()>
where
    S: RankStore,
    O: ObjectStore,
    C: Coordinator,
    I: Invoker,
{
    tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let shard = payload.shard.shard_id;
                let iteration = payload.current_iter;
                if let Err(e) = ctx.run(payload).await {
                    tracing::error!(
                        "Worker for shard {} iteration {} failed: {:#}",
                        shard,
                        iteration,
                        e
                    );
                }
            });
        }
        tracing::debug!("Dispatch loop stopped: all invokers dropped");
    })
}
