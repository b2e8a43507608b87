//! Graph Data Model and Partitioning
//!
//! Defines the page/shard/rank-record data model and the partitioner that
//! prepares a run.
//!
//! ## Core Concepts
//! - **Pages** are opaque identifiers carrying a list of in-neighbors (pages
//!   whose links point at them). The relation map is immutable for a run.
//! - **Shards** are disjoint slices of the page set; every page belongs to
//!   exactly one shard for the whole run, which gives each rank record a
//!   single writer per iteration.
//! - **Partitioner** validates the partition, derives out-degrees, seeds the
//!   initial uniform ranks, persists the shard relation maps, and fans out
//!   the iteration-1 invocations.

pub mod partition;
pub mod types;
