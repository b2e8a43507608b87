//! HTTP handlers exposing the node-local stores to remote workers.

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Path},
    http::StatusCode,
};
use std::sync::Arc;

use super::object::{MemoryObjectStore, ObjectStore};
use super::protocol::{PutResponse, RankGetResponse, RankPutRequest};
use super::rank::{MemoryRankStore, RankStore};
use crate::graph::types::PageId;

pub async fn handle_get_rank(
    Extension(store): Extension<Arc<MemoryRankStore>>,
    Path(page): Path<String>,
) -> (StatusCode, Json<RankGetResponse>) {
    match store.get(&PageId::new(page)).await {
        Ok(Some(record)) => (
            StatusCode::OK,
            Json(RankGetResponse {
                record: Some(record),
            }),
        ),
        Ok(None) => (StatusCode::NOT_FOUND, Json(RankGetResponse { record: None })),
        Err(e) => {
            tracing::error!("Failed to read rank record: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RankGetResponse { record: None }),
            )
        }
    }
}

pub async fn handle_put_rank(
    Extension(store): Extension<Arc<MemoryRankStore>>,
    Json(req): Json<RankPutRequest>,
) -> (StatusCode, Json<PutResponse>) {
    match store.put(req.record).await {
        Ok(_) => (StatusCode::OK, Json(PutResponse { success: true })),
        Err(e) => {
            tracing::error!("Failed to store rank record: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(PutResponse { success: false }),
            )
        }
    }
}

pub async fn handle_get_object(
    Extension(store): Extension<Arc<MemoryObjectStore>>,
    Path((bucket, key)): Path<(String, String)>,
) -> (StatusCode, Vec<u8>) {
    match store.get(&bucket, &key).await {
        Ok(data) => (StatusCode::OK, data),
        Err(e) => {
            tracing::warn!("Object lookup failed: {}", e);
            (StatusCode::NOT_FOUND, Vec::new())
        }
    }
}

pub async fn handle_put_object(
    Extension(store): Extension<Arc<MemoryObjectStore>>,
    Path((bucket, key)): Path<(String, String)>,
    body: Bytes,
) -> (StatusCode, Json<PutResponse>) {
    match store.put(&bucket, &key, body.to_vec()).await {
        Ok(_) => (StatusCode::OK, Json(PutResponse { success: true })),
        Err(e) => {
            tracing::error!("Failed to store object: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(PutResponse { success: false }),
            )
        }
    }
}
