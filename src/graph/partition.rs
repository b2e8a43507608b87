//! Partitioner
//!
//! Prepares a run: splits the page set into disjoint shards, validates the
//! partition, derives out-degrees, seeds the iteration-0 rank records,
//! persists the shard relation maps, arms the barrier, and fans out one
//! iteration-1 invocation per shard.
//!
//! Fan-out uses a bounded set of submission tasks whose join point is
//! "invocation accepted", not "shard finished". Submission failures are
//! collected per shard and do not abort sibling submissions.

use super::types::{IterationPlan, PageId, RankRecord, Shard, ShardId};
use crate::config::RunConfig;
use crate::coordinator::Coordinator;
use crate::error::ProtocolError;
use crate::store::object::ObjectStore;
use crate::store::rank::RankStore;
use crate::worker::invoker::{Invoker, invoke_with_retry};
use crate::worker::types::{ShardRef, WorkerPayload};

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Number of submission attempts per shard during fan-out.
const FANOUT_ATTEMPTS: usize = 3;

/// What the partitioner hands back to the driver: enough to watch the run
/// (via the coordinator) and to reconcile stalled shards.
#[derive(Debug)]
pub struct FanoutOutcome {
    pub run_id: String,
    pub total_pages: usize,
    pub plan: IterationPlan,
    /// One payload per shard, at iteration 1. Reconciliation retargets these
    /// with `WorkerPayload::at_iteration`.
    pub payloads: Vec<WorkerPayload>,
    /// Shards whose iteration-1 submission failed after retries, with the
    /// reason. These shards need re-invocation before the run can finish.
    pub submission_failures: Vec<(ShardId, String)>,
}

pub struct Partitioner<O, S, C, I> {
    object_store: Arc<O>,
    rank_store: Arc<S>,
    coordinator: Arc<C>,
    invoker: Arc<I>,
    config: RunConfig,
}

impl<O, S, C, I> Partitioner<O, S, C, I>
where
    O: ObjectStore,
    S: RankStore,
    C: Coordinator,
    I: Invoker,
{
    pub fn new(
        object_store: Arc<O>,
        rank_store: Arc<S>,
        coordinator: Arc<C>,
        invoker: Arc<I>,
        config: RunConfig,
    ) -> Self {
        Self {
            object_store,
            rank_store,
            coordinator,
            invoker,
            config,
        }
    }

    /// Prepares and launches a run over the given relation map
    /// (page -> in-neighbor list). Returns once every shard's iteration-1
    /// invocation has been submitted (or its submission failure recorded).
    pub async fn run(&self, relations: BTreeMap<PageId, Vec<PageId>>) -> Result<FanoutOutcome> {
        self.config.validate().context("run configuration")?;

        let total_pages = relations.len();
        if total_pages == 0 {
            anyhow::bail!("cannot partition an empty page set");
        }

        let run_id = Uuid::new_v4().to_string();
        let plan = IterationPlan::new(self.config.end_iter, self.config.damping, total_pages);
        tracing::info!(
            "Run {}: {} pages, damping {}, leak {:.6}, {} iterations",
            run_id,
            total_pages,
            plan.damping,
            plan.leak,
            plan.end_iter
        );

        let shards = build_shards(&relations, self.config.target_shard_size);
        validate_partition(&shards, &relations)?;
        tracing::info!(
            "Partitioned {} pages into {} shards (target size {})",
            total_pages,
            shards.len(),
            self.config.target_shard_size
        );

        self.seed_rank_records(&relations, total_pages).await?;
        self.persist_run_inputs(&relations, &shards).await?;

        self.coordinator
            .begin_run(shards.len())
            .await
            .context("arming the iteration barrier")?;

        let payloads: Vec<WorkerPayload> = shards
            .iter()
            .map(|shard| WorkerPayload {
                run_id: run_id.clone(),
                current_iter: plan.start_iter,
                end_iter: plan.end_iter,
                damping: plan.damping,
                leak: plan.leak,
                shard: ShardRef {
                    shard_id: shard.id,
                    bucket: self.config.relation_bucket.clone(),
                    relation_key: self.config.relation_key(shard.id),
                },
            })
            .collect();

        let submission_failures = self.fan_out(&payloads).await;

        Ok(FanoutOutcome {
            run_id,
            total_pages,
            plan,
            payloads,
            submission_failures,
        })
    }

    /// Writes the iteration-0 record for every page: uniform rank 1/N,
    /// weight = out-degree.
    async fn seed_rank_records(
        &self,
        relations: &BTreeMap<PageId, Vec<PageId>>,
        total_pages: usize,
    ) -> Result<()> {
        let degrees = out_degrees(relations);

        for page in relations.keys() {
            let weight = degrees.get(page).copied().unwrap_or(0);
            self.rank_store
                .put(RankRecord::seed(page.clone(), total_pages, weight))
                .await
                .with_context(|| format!("seeding rank record for page {}", page))?;
        }

        tracing::info!("Seeded {} rank records at iteration 0", total_pages);
        Ok(())
    }

    /// Persists the page list and each shard's relation map to the object
    /// store. These are the run's immutable inputs.
    async fn persist_run_inputs(
        &self,
        relations: &BTreeMap<PageId, Vec<PageId>>,
        shards: &[Shard],
    ) -> Result<()> {
        let bucket = &self.config.relation_bucket;

        let pages: Vec<&PageId> = relations.keys().collect();
        self.object_store
            .put(
                bucket,
                &self.config.page_list_key(),
                serde_json::to_vec(&pages)?,
            )
            .await
            .context("persisting the page list")?;

        for shard in shards {
            self.object_store
                .put(
                    bucket,
                    &self.config.relation_key(shard.id),
                    serde_json::to_vec(&shard.relations)?,
                )
                .await
                .with_context(|| format!("persisting relations for shard {}", shard.id))?;
        }

        Ok(())
    }

    /// Submits one iteration-1 invocation per shard through a bounded pool
    /// of submission tasks. Returns the per-shard failures; success means
    /// accepted, not completed.
    async fn fan_out(&self, payloads: &[WorkerPayload]) -> Vec<(ShardId, String)> {
        let semaphore = Arc::new(Semaphore::new(self.config.fanout_concurrency));
        let mut join_set = tokio::task::JoinSet::new();

        for payload in payloads {
            let payload = payload.clone();
            let semaphore = semaphore.clone();
            let invoker = self.invoker.clone();

            join_set.spawn(async move {
                let shard_id = payload.shard.shard_id;
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (shard_id, Err(anyhow::anyhow!("submission pool closed")));
                    }
                };
                let result = invoke_with_retry(&*invoker, payload, FANOUT_ATTEMPTS).await;
                (shard_id, result)
            });
        }

        let mut failures = Vec::new();
        let mut submitted = 0usize;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((shard_id, Ok(_))) => {
                    submitted += 1;
                    tracing::debug!("Submitted iteration 1 for shard {}", shard_id);
                }
                Ok((shard_id, Err(e))) => {
                    tracing::error!("Fan-out for shard {} failed: {}", shard_id, e);
                    failures.push((shard_id, e.to_string()));
                }
                Err(e) => {
                    tracing::error!("Fan-out submission task panicked: {}", e);
                }
            }
        }

        tracing::info!(
            "Fan-out complete: {} submitted, {} failed",
            submitted,
            failures.len()
        );
        failures
    }
}

/// Splits the page set into disjoint shards of at most `target_shard_size`
/// pages. Deterministic: pages are taken in identifier order, so the same
/// input always yields the same partition.
pub fn build_shards(
    relations: &BTreeMap<PageId, Vec<PageId>>,
    target_shard_size: usize,
) -> Vec<Shard> {
    let pages: Vec<(&PageId, &Vec<PageId>)> = relations.iter().collect();

    pages
        .chunks(target_shard_size)
        .enumerate()
        .map(|(index, chunk)| Shard {
            id: index as ShardId,
            relations: chunk
                .iter()
                .map(|(page, neighbors)| ((*page).clone(), (*neighbors).clone()))
                .collect(),
        })
        .collect()
}

/// Verifies the shard invariant: every page appears in exactly one shard and
/// the union of shards equals the page set. Fatal before iteration 1.
pub fn validate_partition(
    shards: &[Shard],
    relations: &BTreeMap<PageId, Vec<PageId>>,
) -> Result<()> {
    let mut seen: HashSet<&PageId> = HashSet::with_capacity(relations.len());

    for shard in shards {
        for page in shard.relations.keys() {
            if !seen.insert(page) {
                return Err(ProtocolError::PartitionInconsistency {
                    page: page.to_string(),
                    count: 2,
                }
                .into());
            }
        }
    }

    if seen.len() != relations.len() {
        let missing = relations
            .keys()
            .find(|page| !seen.contains(page))
            .map(|page| page.to_string())
            .unwrap_or_default();
        return Err(ProtocolError::PartitionInconsistency {
            page: missing,
            count: 0,
        }
        .into());
    }

    Ok(())
}

/// Out-degree of every page, derived from the in-neighbor lists: page q's
/// out-degree is the number of pages listing q as an in-neighbor. Pages
/// nobody links from have out-degree 0 and are never consumed as neighbors.
pub fn out_degrees(relations: &BTreeMap<PageId, Vec<PageId>>) -> HashMap<PageId, u32> {
    let mut degrees: HashMap<PageId, u32> = HashMap::with_capacity(relations.len());

    for neighbors in relations.values() {
        for neighbor in neighbors {
            *degrees.entry(neighbor.clone()).or_insert(0) += 1;
        }
    }

    degrees
}
