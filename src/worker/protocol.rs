//! Worker Invocation Protocol
//!
//! The request body for `/invoke` is the `WorkerPayload` itself; the node
//! acknowledges acceptance before the shard runs (asynchronous start).

use serde::{Deserialize, Serialize};

pub const ENDPOINT_INVOKE: &str = "/invoke";

#[derive(Debug, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub accepted: bool,
}
