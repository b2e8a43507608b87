//! Sharded PageRank Cluster Library
//!
//! This library crate defines the core modules of the distributed iteration
//! protocol. It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! Five subsystems cooperate through trait boundaries:
//!
//! - **`graph`**: The data model (pages, shards, rank records) and the
//!   partitioner that splits the page set into disjoint shards, seeds the
//!   initial ranks, and fans out the first iteration.
//! - **`store`**: The shared-state layer. Defines the object store (immutable
//!   shard relation maps) and the rank store (one record per page, overwritten
//!   each iteration), with in-memory and HTTP-backed implementations.
//! - **`coordinator`**: The iteration barrier. Tracks per-iteration shard
//!   completions and gates advancement to iteration i+1 until iteration i is
//!   globally complete.
//! - **`worker`**: The per-shard, per-iteration unit of work. Reads neighbor
//!   ranks, computes new ranks for every page in its shard, writes them back,
//!   and self-reschedules through the invoker once the barrier releases.
//! - **`config`**: The run configuration object, constructed once at startup
//!   and passed into the other subsystems (no ambient global state).

pub mod config;
pub mod coordinator;
pub mod error;
pub mod graph;
pub mod node;
pub mod store;
pub mod worker;
