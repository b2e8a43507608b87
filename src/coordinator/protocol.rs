//! Coordinator Network Protocol
//!
//! DTOs and endpoint paths for reaching the barrier from remote workers and
//! the partitioner.

use super::types::IterationStatus;
use crate::graph::types::ShardId;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_COORD_BEGIN: &str = "/coord/begin";
pub const ENDPOINT_COORD_REPORT: &str = "/coord/report";
pub const ENDPOINT_COORD_STATUS: &str = "/coord/status";
pub const ENDPOINT_COORD_MISSING: &str = "/coord/missing";

#[derive(Debug, Serialize, Deserialize)]
pub struct BeginRunRequest {
    pub total_shards: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportCompleteRequest {
    pub iteration: u32,
    pub shard: ShardId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportCompleteResponse {
    pub status: IterationStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: IterationStatus,
    pub complete: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MissingShardsResponse {
    pub iteration: u32,
    pub shards: Vec<ShardId>,
}
