//! Iteration Barrier
//!
//! The one piece of shared state that needs atomic update semantics: the
//! per-iteration completion sets. Everything else in the protocol is
//! partitioned by shard ownership.

use super::Coordinator;
use super::protocol::{
    BeginRunRequest, ENDPOINT_COORD_BEGIN, ENDPOINT_COORD_MISSING, ENDPOINT_COORD_REPORT,
    ENDPOINT_COORD_STATUS, MissingShardsResponse, ReportCompleteRequest, ReportCompleteResponse,
    StatusResponse,
};
use super::types::IterationStatus;
use crate::error::ProtocolError;
use crate::graph::types::ShardId;
use crate::store::client::RetryingClient;

use anyhow::Result;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-process barrier. Shard ids are the dense indexes 0..total_shards
/// assigned by the partitioner.
pub struct IterationBarrier {
    total_shards: AtomicUsize,
    /// Iteration -> set of shards that reported it complete.
    completions: DashMap<u32, HashSet<ShardId>>,
}

impl IterationBarrier {
    pub fn new(total_shards: usize) -> Self {
        Self {
            total_shards: AtomicUsize::new(total_shards),
            completions: DashMap::new(),
        }
    }

    pub fn total_shards(&self) -> usize {
        self.total_shards.load(Ordering::SeqCst)
    }

    pub fn status(&self, iteration: u32) -> IterationStatus {
        if iteration == 0 {
            return IterationStatus::Complete;
        }

        let total = self.total_shards();
        let completed = self
            .completions
            .get(&iteration)
            .map(|shards| shards.len())
            .unwrap_or(0);

        if completed == 0 {
            IterationStatus::Pending
        } else if completed >= total && total > 0 {
            IterationStatus::Complete
        } else {
            IterationStatus::PartiallyComplete { completed, total }
        }
    }

    pub fn record_completion(&self, iteration: u32, shard: ShardId) -> IterationStatus {
        let mut shards = self
            .completions
            .entry(iteration)
            .or_insert_with(HashSet::new);
        let newly_reported = shards.insert(shard);
        drop(shards);

        if newly_reported {
            tracing::debug!("Shard {} reported iteration {} complete", shard, iteration);
        } else {
            tracing::debug!(
                "Duplicate completion report for shard {} iteration {}",
                shard,
                iteration
            );
        }

        self.status(iteration)
    }

    pub fn unreported_shards(&self, iteration: u32) -> Vec<ShardId> {
        if iteration == 0 {
            return Vec::new();
        }

        let total = self.total_shards() as u32;
        match self.completions.get(&iteration) {
            Some(reported) => (0..total).filter(|s| !reported.contains(s)).collect(),
            None => (0..total).collect(),
        }
    }
}

impl Coordinator for IterationBarrier {
    async fn begin_run(&self, total_shards: usize) -> Result<()> {
        self.total_shards.store(total_shards, Ordering::SeqCst);
        self.completions.clear();
        tracing::info!("Barrier armed for {} shards", total_shards);
        Ok(())
    }

    async fn report_complete(&self, iteration: u32, shard: ShardId) -> Result<IterationStatus> {
        Ok(self.record_completion(iteration, shard))
    }

    async fn is_complete(&self, iteration: u32) -> Result<bool> {
        Ok(self.status(iteration).is_complete())
    }

    async fn missing_shards(&self, iteration: u32) -> Result<Vec<ShardId>> {
        Ok(self.unreported_shards(iteration))
    }
}

/// Coordinator reached over HTTP on the node hosting the barrier.
pub struct HttpCoordinator {
    client: RetryingClient,
    base_url: String,
}

impl HttpCoordinator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: RetryingClient::new(),
            base_url: base_url.into(),
        }
    }

    fn unavailable(&self, reason: String) -> ProtocolError {
        ProtocolError::StoreUnavailable {
            attempts: self.client.attempts(),
            reason,
        }
    }
}

impl Coordinator for HttpCoordinator {
    async fn begin_run(&self, total_shards: usize) -> Result<()> {
        let url = format!("{}{}", self.base_url, ENDPOINT_COORD_BEGIN);
        let response = self
            .client
            .post_json(&url, &BeginRunRequest { total_shards })
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self
                .unavailable(format!("begin_run returned {}", response.status()))
                .into());
        }
        Ok(())
    }

    async fn report_complete(&self, iteration: u32, shard: ShardId) -> Result<IterationStatus> {
        let url = format!("{}{}", self.base_url, ENDPOINT_COORD_REPORT);
        let payload = ReportCompleteRequest { iteration, shard };
        let response = self
            .client
            .post_json(&url, &payload)
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self
                .unavailable(format!("report_complete returned {}", response.status()))
                .into());
        }

        let body: ReportCompleteResponse = response.json().await?;
        Ok(body.status)
    }

    async fn is_complete(&self, iteration: u32) -> Result<bool> {
        let url = format!("{}{}/{}", self.base_url, ENDPOINT_COORD_STATUS, iteration);
        let response = self
            .client
            .get(&url)
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self
                .unavailable(format!("status returned {}", response.status()))
                .into());
        }

        let body: StatusResponse = response.json().await?;
        Ok(body.complete)
    }

    async fn missing_shards(&self, iteration: u32) -> Result<Vec<ShardId>> {
        let url = format!("{}{}/{}", self.base_url, ENDPOINT_COORD_MISSING, iteration);
        let response = self
            .client
            .get(&url)
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self
                .unavailable(format!("missing_shards returned {}", response.status()))
                .into());
        }

        let body: MissingShardsResponse = response.json().await?;
        Ok(body.shards)
    }
}
