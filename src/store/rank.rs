//! Shared Rank Store
//!
//! Holds exactly one `RankRecord` per page. Writes are last-write-wins
//! upserts; the partitioning guarantees each key has a single writer per
//! iteration, so there are no write-write races. Reads may come from any
//! shard at any time.

use super::client::RetryingClient;
use super::protocol::{ENDPOINT_RANK, PutResponse, RankGetResponse, RankPutRequest};
use crate::error::ProtocolError;
use crate::graph::types::{PageId, RankRecord};

use anyhow::Result;
use dashmap::DashMap;
use std::future::Future;

/// Access contract consumed by workers and the partitioner.
///
/// `get` returning `Ok(None)` is the legitimate "absent" case (zero
/// contribution); `Err` is a store failure that has already been retried at
/// the operation boundary.
pub trait RankStore: Send + Sync + 'static {
    fn get(&self, page: &PageId) -> impl Future<Output = Result<Option<RankRecord>>> + Send;
    fn put(&self, record: RankRecord) -> impl Future<Output = Result<()>> + Send;
}

/// In-memory rank store used by the single-process mode and hosted by the
/// serve-mode node behind the HTTP handlers.
pub struct MemoryRankStore {
    records: DashMap<PageId, RankRecord>,
}

impl MemoryRankStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for MemoryRankStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RankStore for MemoryRankStore {
    async fn get(&self, page: &PageId) -> Result<Option<RankRecord>> {
        Ok(self.records.get(page).map(|entry| entry.value().clone()))
    }

    async fn put(&self, record: RankRecord) -> Result<()> {
        self.records.insert(record.page.clone(), record);
        Ok(())
    }
}

/// Rank store reached over HTTP on a remote node.
pub struct HttpRankStore {
    client: RetryingClient,
    base_url: String,
}

impl HttpRankStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: RetryingClient::new(),
            base_url: base_url.into(),
        }
    }

    fn unavailable(&self, e: anyhow::Error) -> ProtocolError {
        ProtocolError::StoreUnavailable {
            attempts: self.client.attempts(),
            reason: e.to_string(),
        }
    }
}

impl RankStore for HttpRankStore {
    async fn get(&self, page: &PageId) -> Result<Option<RankRecord>> {
        let url = format!("{}{}/{}", self.base_url, ENDPOINT_RANK, page);
        let response = self.client.get(&url).await.map_err(|e| self.unavailable(e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ProtocolError::StoreUnavailable {
                attempts: self.client.attempts(),
                reason: format!("rank get returned {}", response.status()),
            }
            .into());
        }

        let body: RankGetResponse = response.json().await?;
        Ok(body.record)
    }

    async fn put(&self, record: RankRecord) -> Result<()> {
        let url = format!("{}{}", self.base_url, ENDPOINT_RANK);
        let payload = RankPutRequest { record };
        let response = self
            .client
            .post_json(&url, &payload)
            .await
            .map_err(|e| self.unavailable(e))?;

        if !response.status().is_success() {
            return Err(ProtocolError::StoreUnavailable {
                attempts: self.client.attempts(),
                reason: format!("rank put returned {}", response.status()),
            }
            .into());
        }

        let ack: PutResponse = response.json().await?;
        if !ack.success {
            return Err(anyhow::anyhow!("rank put was not acknowledged"));
        }
        Ok(())
    }
}
