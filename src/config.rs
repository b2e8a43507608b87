//! Run Configuration
//!
//! A single configuration object constructed at startup and passed into the
//! partitioner, workers, and coordinator. Replaces any process-wide mutable
//! state: everything a component needs to know about the run travels either
//! in this struct or in the worker payload derived from it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Object store bucket holding the shard relation maps and the page list.
    pub relation_bucket: String,
    /// Object-key prefix for relation files within the bucket.
    pub key_prefix: String,
    /// Maximum number of pages assigned to one shard.
    pub target_shard_size: usize,
    /// Last iteration to run (inclusive). Iteration numbering starts at 1.
    pub end_iter: u32,
    /// Damping factor d; the leak constant is derived as (1 - d) / N.
    pub damping: f64,
    /// Concurrent submission tasks used during fan-out.
    pub fanout_concurrency: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            relation_bucket: "pagerank".to_string(),
            key_prefix: "relations".to_string(),
            target_shard_size: 64,
            end_iter: 10,
            damping: 0.8,
            fanout_concurrency: 16,
        }
    }
}

impl RunConfig {
    /// Loads a configuration from a JSON file.
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path))?;
        let config: RunConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that cannot produce a well-formed run.
    pub fn validate(&self) -> Result<()> {
        if !(self.damping > 0.0 && self.damping < 1.0) {
            anyhow::bail!("damping factor must be in (0, 1), got {}", self.damping);
        }
        if self.target_shard_size == 0 {
            anyhow::bail!("target shard size must be positive");
        }
        if self.end_iter == 0 {
            anyhow::bail!("end_iter must be at least 1");
        }
        if self.fanout_concurrency == 0 {
            anyhow::bail!("fanout concurrency must be positive");
        }
        Ok(())
    }

    /// Object key for one shard's relation map.
    pub fn relation_key(&self, shard_id: u32) -> String {
        format!("{}/shard-{}.json", self.key_prefix, shard_id)
    }

    /// Object key for the full page-id list.
    pub fn page_list_key(&self) -> String {
        format!("{}/pages.json", self.key_prefix)
    }
}
