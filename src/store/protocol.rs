//! Store Network Protocol
//!
//! Defines the API endpoints and Data Transfer Objects (DTOs) used to reach
//! the rank store and the object store over HTTP.
//!
//! Rank records travel as JSON; object payloads travel as raw bytes (the
//! object store does not interpret its values).

use crate::graph::types::RankRecord;
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Rank store: `GET /rank/:page`, `POST /rank`.
pub const ENDPOINT_RANK: &str = "/rank";
/// Object store: `GET`/`PUT` `/object/:bucket/*key`.
pub const ENDPOINT_OBJECT: &str = "/object";

// --- Data Transfer Objects ---

/// Response for a rank record lookup. `None` means the page has no record
/// yet, which readers treat as a degraded (zero-contribution) read.
#[derive(Debug, Serialize, Deserialize)]
pub struct RankGetResponse {
    pub record: Option<RankRecord>,
}

/// Upsert request for one page's rank record.
#[derive(Debug, Serialize, Deserialize)]
pub struct RankPutRequest {
    pub record: RankRecord,
}

/// Standard acknowledgment for write operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct PutResponse {
    pub success: bool,
}
