//! Worker Module
//!
//! The per-shard, per-iteration unit of work. Each worker execution is
//! stateless: everything it needs arrives in the `WorkerPayload`, and all
//! cross-worker communication goes through the rank store and the
//! coordinator.
//!
//! ## Execution lifecycle
//! 1. Wait until the previous iteration is globally complete (iteration 0 is
//!    satisfied by the seed records).
//! 2. Load the shard's relation map from the object store.
//! 3. Compute and write the new rank for every owned page (`ranker`).
//! 4. Report completion to the coordinator.
//! 5. Once the coordinator releases the iteration, submit the continuation
//!    for iteration i+1 through the invoker, or terminate at `end_iter`.
//!
//! ## Submodules
//! - **`ranker`**: The rank-update algorithm and its degraded-read handling.
//! - **`runner`**: The lifecycle above, plus the local dispatch loop.
//! - **`invoker`**: The asynchronous-start interface (channel-backed local
//!   implementation and HTTP-backed remote one) with submission retry.
//! - **`protocol`** / **`handlers`**: HTTP contract for remote invocation.

pub mod handlers;
pub mod invoker;
pub mod protocol;
pub mod ranker;
pub mod runner;
pub mod types;

#[cfg(test)]
mod tests;
