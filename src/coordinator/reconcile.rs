//! Stalled-Shard Reconciliation
//!
//! A shard whose worker crashed, or whose self-reinvocation never submitted,
//! stops reporting completions. The barrier makes that visible through
//! `missing_shards`; this hook re-invokes exactly those shards. Safe to call
//! repeatedly: workers are deterministic within an iteration and completion
//! reports are idempotent, so a duplicate invocation rewrites the same
//! records and changes nothing.

use super::Coordinator;
use crate::graph::types::ShardId;
use crate::worker::invoker::{Invoker, invoke_with_retry};
use crate::worker::types::WorkerPayload;

use anyhow::Result;
use std::time::{Duration, Instant};

/// Re-invokes every shard that has not reported `iteration` yet.
///
/// `payloads` must hold one payload per shard of the run with
/// `current_iter == iteration`. Returns the shard ids that were re-invoked.
pub async fn reinvoke_missing<C: Coordinator, I: Invoker>(
    coordinator: &C,
    invoker: &I,
    iteration: u32,
    payloads: &[WorkerPayload],
) -> Result<Vec<ShardId>> {
    let missing = coordinator.missing_shards(iteration).await?;
    if missing.is_empty() {
        return Ok(Vec::new());
    }

    tracing::warn!(
        "Iteration {} has {} unreported shards: {:?}",
        iteration,
        missing.len(),
        missing
    );

    let mut reinvoked = Vec::new();
    for payload in payloads {
        if !missing.contains(&payload.shard.shard_id) {
            continue;
        }
        debug_assert_eq!(payload.current_iter, iteration);

        match invoke_with_retry(invoker, payload.clone(), 3).await {
            Ok(_) => {
                tracing::info!(
                    "Re-invoked shard {} for iteration {}",
                    payload.shard.shard_id,
                    iteration
                );
                reinvoked.push(payload.shard.shard_id);
            }
            Err(e) => {
                tracing::error!(
                    "Re-invocation of shard {} for iteration {} failed: {}",
                    payload.shard.shard_id,
                    iteration,
                    e
                );
            }
        }
    }

    Ok(reinvoked)
}

/// Watches a run through to `end_iter`, re-invoking shards that stay
/// unreported longer than `grace`.
///
/// `payloads` is the per-shard payload set from fan-out; each reconciliation
/// pass retargets them at the iteration currently blocking the run.
pub async fn supervise_until_complete<C: Coordinator, I: Invoker>(
    coordinator: &C,
    invoker: &I,
    payloads: &[WorkerPayload],
    end_iter: u32,
    grace: Duration,
) -> Result<()> {
    let poll = Duration::from_millis(200);
    let mut current = 1u32;
    let mut stuck_since = Instant::now();

    loop {
        if coordinator.is_complete(current).await? {
            if current >= end_iter {
                return Ok(());
            }
            current += 1;
            stuck_since = Instant::now();
            continue;
        }

        if stuck_since.elapsed() >= grace {
            let retargeted: Vec<WorkerPayload> =
                payloads.iter().map(|p| p.at_iteration(current)).collect();
            reinvoke_missing(coordinator, invoker, current, &retargeted).await?;
            stuck_since = Instant::now();
        }

        tokio::time::sleep(poll).await;
    }
}
