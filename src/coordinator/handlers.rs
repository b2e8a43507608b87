//! HTTP handlers exposing the node-local barrier.

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
};
use std::sync::Arc;

use super::Coordinator;
use super::barrier::IterationBarrier;
use super::protocol::{
    BeginRunRequest, MissingShardsResponse, ReportCompleteRequest, ReportCompleteResponse,
    StatusResponse,
};

pub async fn handle_begin_run(
    Extension(barrier): Extension<Arc<IterationBarrier>>,
    Json(req): Json<BeginRunRequest>,
) -> StatusCode {
    match barrier.begin_run(req.total_shards).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::error!("Failed to arm barrier: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub async fn handle_report_complete(
    Extension(barrier): Extension<Arc<IterationBarrier>>,
    Json(req): Json<ReportCompleteRequest>,
) -> (StatusCode, Json<ReportCompleteResponse>) {
    let status = barrier.record_completion(req.iteration, req.shard);
    (StatusCode::OK, Json(ReportCompleteResponse { status }))
}

pub async fn handle_iteration_status(
    Extension(barrier): Extension<Arc<IterationBarrier>>,
    Path(iteration): Path<u32>,
) -> (StatusCode, Json<StatusResponse>) {
    let status = barrier.status(iteration);
    (
        StatusCode::OK,
        Json(StatusResponse {
            status,
            complete: status.is_complete(),
        }),
    )
}

pub async fn handle_missing_shards(
    Extension(barrier): Extension<Arc<IterationBarrier>>,
    Path(iteration): Path<u32>,
) -> (StatusCode, Json<MissingShardsResponse>) {
    let shards = barrier.unreported_shards(iteration);
    (
        StatusCode::OK,
        Json(MissingShardsResponse { iteration, shards }),
    )
}
