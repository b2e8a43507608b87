//! Serve-Mode Node Assembly
//!
//! A node hosts the shared state (rank store, object store, barrier) and
//! accepts worker invocations over HTTP. Workers running on the node talk to
//! the local stores directly; remote drivers and workers reach them through
//! the HTTP surface built here.

use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use std::sync::Arc;

use crate::coordinator::barrier::IterationBarrier;
use crate::coordinator::handlers::{
    handle_begin_run, handle_iteration_status, handle_missing_shards, handle_report_complete,
};
use crate::coordinator::protocol::{ENDPOINT_COORD_BEGIN, ENDPOINT_COORD_REPORT};
use crate::store::handlers::{
    handle_get_object, handle_get_rank, handle_put_object, handle_put_rank,
};
use crate::store::object::MemoryObjectStore;
use crate::store::protocol::ENDPOINT_RANK;
use crate::store::rank::MemoryRankStore;
use crate::worker::handlers::handle_invoke;
use crate::worker::invoker::LocalInvoker;
use crate::worker::protocol::ENDPOINT_INVOKE;
use crate::worker::runner::{self, WorkerContext};

/// The assembled node: shared state plus the HTTP surface over it.
pub struct Node {
    pub rank_store: Arc<MemoryRankStore>,
    pub object_store: Arc<MemoryObjectStore>,
    pub barrier: Arc<IterationBarrier>,
    pub router: Router,
}

/// Builds the node state, starts the local dispatch loop, and wires every
/// endpoint of the store/coordinator/invoker surface.
pub fn build_node() -> Node {
    let rank_store = Arc::new(MemoryRankStore::new());
    let object_store = Arc::new(MemoryObjectStore::new());
    let barrier = Arc::new(IterationBarrier::new(0));

    let (invoker, rx) = LocalInvoker::new();
    let invoker = Arc::new(invoker);
    let ctx = WorkerContext::new(
        rank_store.clone(),
        object_store.clone(),
        barrier.clone(),
        invoker.clone(),
    );
    runner::spawn_dispatcher(ctx.clone(), rx);

    let router = Router::new()
        .route(&format!("{}/:page", ENDPOINT_RANK), get(handle_get_rank))
        .route(ENDPOINT_RANK, post(handle_put_rank))
        .route(
            "/object/:bucket/*key",
            get(handle_get_object).put(handle_put_object),
        )
        .route(ENDPOINT_COORD_BEGIN, post(handle_begin_run))
        .route(ENDPOINT_COORD_REPORT, post(handle_report_complete))
        .route("/coord/status/:iteration", get(handle_iteration_status))
        .route("/coord/missing/:iteration", get(handle_missing_shards))
        .route(
            ENDPOINT_INVOKE,
            post(handle_invoke::<MemoryRankStore, MemoryObjectStore, IterationBarrier, LocalInvoker>),
        )
        .layer(Extension(rank_store.clone()))
        .layer(Extension(object_store.clone()))
        .layer(Extension(barrier.clone()))
        .layer(Extension(ctx));

    Node {
        rank_store,
        object_store,
        barrier,
        router,
    }
}
