//! Invoker
//!
//! Accepts a worker payload and starts one asynchronous worker execution.
//! Delivery is at-least-once with no ordering guarantee, so everything a
//! payload triggers must be idempotent. Submission acceptance is decoupled
//! from execution: `invoke` returning `Ok` means the payload was handed off,
//! not that the shard finished.

use super::protocol::{ENDPOINT_INVOKE, InvokeResponse};
use super::types::WorkerPayload;
use crate::error::ProtocolError;
use crate::store::client::RetryingClient;

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

pub trait Invoker: Send + Sync + 'static {
    fn invoke(&self, payload: WorkerPayload) -> impl Future<Output = Result<()>> + Send;
}

/// In-process invoker: hands payloads to the dispatch loop over a channel.
/// The dispatch loop (`runner::spawn_dispatcher`) spawns one task per
/// received payload.
pub struct LocalInvoker {
    tx: mpsc::UnboundedSender<WorkerPayload>,
}

impl LocalInvoker {
    /// Returns the invoker and the receiving end for the dispatch loop.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkerPayload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Invoker for LocalInvoker {
    async fn invoke(&self, payload: WorkerPayload) -> Result<()> {
        self.tx
            .send(payload)
            .map_err(|_| anyhow::anyhow!("dispatch loop has shut down"))
    }
}

/// Invoker posting payloads to a remote node's `/invoke` endpoint.
pub struct HttpInvoker {
    client: RetryingClient,
    base_url: String,
}

impl HttpInvoker {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: RetryingClient::new(),
            base_url: base_url.into(),
        }
    }
}

impl Invoker for HttpInvoker {
    async fn invoke(&self, payload: WorkerPayload) -> Result<()> {
        let url = format!("{}{}", self.base_url, ENDPOINT_INVOKE);
        let response = self.client.post_json(&url, &payload).await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "invoke returned {} for shard {}",
                response.status(),
                payload.shard.shard_id
            ));
        }

        let ack: InvokeResponse = response.json().await?;
        if !ack.accepted {
            return Err(anyhow::anyhow!(
                "invocation for shard {} was rejected",
                payload.shard.shard_id
            ));
        }
        Ok(())
    }
}

/// Submits an invocation, retrying with backoff and jitter.
///
/// An unretried submission failure permanently stalls the shard, so this is
/// the mandatory path for fan-out, self-reinvocation, and reconciliation.
/// On exhaustion the shard is reported as stalled via `InvocationFailure`.
pub async fn invoke_with_retry<I: Invoker>(
    invoker: &I,
    payload: WorkerPayload,
    attempts: usize,
) -> Result<()> {
    let shard = payload.shard.shard_id;
    let mut delay_ms = 150u64;
    let mut last_error = String::new();

    for attempt in 0..attempts {
        match invoker.invoke(payload.clone()).await {
            Ok(_) => return Ok(()),
            Err(e) => {
                last_error = e.to_string();
                tracing::warn!(
                    "Invocation attempt {}/{} for shard {} failed: {}",
                    attempt + 1,
                    attempts,
                    shard,
                    e
                );
                if attempt + 1 < attempts {
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }
    }

    Err(ProtocolError::InvocationFailure {
        shard,
        reason: last_error,
    }
    .into())
}
