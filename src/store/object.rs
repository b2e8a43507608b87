//! Object Store
//!
//! Immutable run inputs: per-shard relation maps and the full page list,
//! written once by the partitioner and read by workers at the start of each
//! invocation. Values are opaque bytes; callers decide the encoding.

use super::client::RetryingClient;
use super::protocol::{ENDPOINT_OBJECT, PutResponse};
use crate::error::ProtocolError;

use anyhow::Result;
use dashmap::DashMap;
use std::future::Future;

pub trait ObjectStore: Send + Sync + 'static {
    /// Fetches an object. A missing object is an error: run inputs are
    /// written before any worker that reads them is invoked.
    fn get(&self, bucket: &str, key: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
    fn put(&self, bucket: &str, key: &str, data: Vec<u8>)
    -> impl Future<Output = Result<()>> + Send;
}

/// In-memory object store. Structure: `bucket -> key -> bytes`.
pub struct MemoryObjectStore {
    buckets: DashMap<String, DashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .get(bucket)
            .map(|objects| objects.len())
            .unwrap_or(0)
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.buckets
            .get(bucket)
            .and_then(|objects| objects.get(key).map(|entry| entry.value().clone()))
            .ok_or_else(|| anyhow::anyhow!("object not found: {}/{}", bucket, key))
    }

    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        let objects = self
            .buckets
            .entry(bucket.to_string())
            .or_insert_with(DashMap::new);
        objects.insert(key.to_string(), data);
        Ok(())
    }
}

/// Object store reached over HTTP on a remote node.
pub struct HttpObjectStore {
    client: RetryingClient,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: RetryingClient::new(),
            base_url: base_url.into(),
        }
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}{}/{}/{}", self.base_url, ENDPOINT_OBJECT, bucket, key)
    }

    fn unavailable(&self, e: anyhow::Error) -> ProtocolError {
        ProtocolError::StoreUnavailable {
            attempts: self.client.attempts(),
            reason: e.to_string(),
        }
    }
}

impl ObjectStore for HttpObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(&self.object_url(bucket, key))
            .await
            .map_err(|e| self.unavailable(e))?;

        if !response.status().is_success() {
            return Err(ProtocolError::StoreUnavailable {
                attempts: self.client.attempts(),
                reason: format!("object get {}/{} returned {}", bucket, key, response.status()),
            }
            .into());
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        let response = self
            .client
            .put_bytes(&self.object_url(bucket, key), data)
            .await
            .map_err(|e| self.unavailable(e))?;

        if !response.status().is_success() {
            return Err(ProtocolError::StoreUnavailable {
                attempts: self.client.attempts(),
                reason: format!("object put {}/{} returned {}", bucket, key, response.status()),
            }
            .into());
        }

        let ack: PutResponse = response.json().await?;
        if !ack.success {
            return Err(anyhow::anyhow!("object put was not acknowledged"));
        }
        Ok(())
    }
}
