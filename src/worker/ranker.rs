//! Rank Update Algorithm
//!
//! For each page p in the shard:
//!
//! ```text
//! rank_i(p) = damping * sum(rank_{i-1}(q) / weight(q) for q in in_neighbors(p)) + leak
//! ```
//!
//! Neighbor lookups are tri-state: a found record contributes its
//! previous-iteration rank, an absent record contributes zero (degraded read,
//! counted and logged), and a store error fails the page. Per-page failures
//! are contained: sibling pages in the shard still run, and the shard-level
//! retry (reconciliation) recovers the failed ones.

use super::types::{ShardReport, WorkerPayload};
use crate::error::ProtocolError;
use crate::graph::types::{PageId, RankRecord, Shard};
use crate::store::rank::RankStore;

use anyhow::{Context, Result};
use std::time::Instant;

/// Tri-state result of one neighbor lookup. Only `Absent` is a legitimate
/// zero-contribution case; `Failed` is a retryable store failure.
pub enum NeighborLookup {
    Found(RankRecord),
    Absent,
    Failed(anyhow::Error),
}

async fn lookup_neighbor<S: RankStore>(store: &S, page: &PageId) -> NeighborLookup {
    match store.get(page).await {
        Ok(Some(record)) => NeighborLookup::Found(record),
        Ok(None) => NeighborLookup::Absent,
        Err(e) => NeighborLookup::Failed(e),
    }
}

/// Computes and writes the new rank for every page in the shard.
///
/// Never returns an error: failures are counted in the report so one bad
/// page cannot abort its siblings.
pub async fn process_shard<S: RankStore>(
    store: &S,
    shard: &Shard,
    payload: &WorkerPayload,
) -> ShardReport {
    let started = Instant::now();
    let mut report = ShardReport::new(shard.id, payload.current_iter);

    for (page, neighbors) in &shard.relations {
        match compute_page(store, page, neighbors, payload, &mut report).await {
            Ok(_) => report.pages_processed += 1,
            Err(e) => {
                report.pages_failed += 1;
                tracing::error!(
                    "Page {} failed at iteration {}: {:#}",
                    page,
                    payload.current_iter,
                    e
                );
            }
        }
    }

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    report
}

/// Computes one page's rank and upserts its record.
///
/// Idempotent: if the page's own record already carries `current_iter` (a
/// duplicate invocation after reconciliation), the retained previous rank is
/// used again and the identical record is rewritten.
async fn compute_page<S: RankStore>(
    store: &S,
    page: &PageId,
    neighbors: &[PageId],
    payload: &WorkerPayload,
    report: &mut ShardReport,
) -> Result<()> {
    let own = store
        .get(page)
        .await
        .with_context(|| format!("reading own record for page {}", page))?;

    // The page's weight is fixed at seeding; prev_rank is whatever the last
    // iteration produced. A record already stamped with this iteration means
    // this is a duplicate execution.
    let (prev_rank, weight) = match &own {
        Some(record) if record.iteration >= payload.current_iter => {
            (record.prev_rank, record.weight)
        }
        Some(record) => (record.rank, record.weight),
        None => {
            tracing::error!(
                "Own record for page {} missing at iteration {}; was the run seeded?",
                page,
                payload.current_iter
            );
            (0.0, 0)
        }
    };

    let mut sum = 0.0;
    for neighbor in neighbors {
        match lookup_neighbor(store, neighbor).await {
            NeighborLookup::Found(record) => {
                if record.weight == 0 {
                    // A zero out-degree page cannot legitimately appear as an
                    // in-neighbor; treat its record as unusable.
                    report.degraded_reads += 1;
                    tracing::warn!(
                        "Neighbor {} of page {} has zero weight, contributing nothing",
                        neighbor,
                        page
                    );
                    continue;
                }
                sum += neighbor_value(&record, payload.current_iter) / record.weight as f64;
            }
            NeighborLookup::Absent => {
                report.degraded_reads += 1;
                tracing::warn!(
                    "Degraded read: {}",
                    ProtocolError::MissingNeighborRecord {
                        page: page.to_string(),
                        neighbor: neighbor.to_string(),
                    }
                );
            }
            NeighborLookup::Failed(e) => {
                return Err(e.context(format!("reading neighbor {} of page {}", neighbor, page)));
            }
        }
    }

    let rank = payload.damping * sum + payload.leak;
    store
        .put(RankRecord {
            page: page.clone(),
            iteration: payload.current_iter,
            rank,
            prev_rank,
            weight,
        })
        .await
        .with_context(|| format!("writing record for page {}", page))?;

    Ok(())
}

/// The previous-iteration rank of a neighbor.
///
/// A record stamped with the reader's own iteration belongs to a shard that
/// already finished this iteration; its retained `prev_rank` is the value
/// the formula needs. Anything older carries it in `rank`.
fn neighbor_value(record: &RankRecord, current_iter: u32) -> f64 {
    if record.iteration >= current_iter {
        record.prev_rank
    } else {
        record.rank
    }
}
