//! Shared State Layer
//!
//! The two stores every component exchanges state through:
//!
//! - **Object store**: immutable per-shard relation maps and the full page
//!   list, written once by the partitioner before iteration 1.
//! - **Rank store**: one `RankRecord` per page, overwritten by the owning
//!   shard each iteration (last-write-wins upsert). Any shard may read any
//!   page, so cross-iteration consistency is the barrier's job, not the
//!   store's.
//!
//! Both are defined as traits with an in-memory implementation (`DashMap`
//! backed, used by the single-process mode and the serve-mode node) and an
//! HTTP-backed implementation (used by remote workers). All remote calls go
//! through `RetryingClient`, which retries with exponential backoff and
//! jitter at the operation boundary.

pub mod client;
pub mod handlers;
pub mod object;
pub mod protocol;
pub mod rank;

#[cfg(test)]
mod tests;
