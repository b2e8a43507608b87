//! HTTP handler accepting remote worker invocations.

use axum::{Json, extract::Extension, http::StatusCode};
use std::sync::Arc;

use super::invoker::Invoker;
use super::protocol::InvokeResponse;
use super::runner::WorkerContext;
use super::types::WorkerPayload;
use crate::coordinator::Coordinator;
use crate::store::object::ObjectStore;
use crate::store::rank::RankStore;

/// Accepts a payload and starts the worker execution asynchronously. The
/// response acknowledges submission only; completion is observable through
/// the coordinator.
pub async fn handle_invoke<S, O, C, I>(
    Extension(ctx): Extension<Arc<WorkerContext<S, O, C, I>>>,
    Json(payload): Json<WorkerPayload>,
) -> (StatusCode, Json<InvokeResponse>)
where
    S: RankStore,
    O: ObjectStore,
    C: Coordinator,
    I: Invoker,
{
    let shard = payload.shard.shard_id;
    let iteration = payload.current_iter;

    tokio::spawn(async move {
        if let Err(e) = ctx.run(payload).await {
            tracing::error!(
                "Invoked worker for shard {} iteration {} failed: {:#}",
                shard,
                iteration,
                e
            );
        }
    });

    (StatusCode::ACCEPTED, Json(InvokeResponse { accepted: true }))
}
