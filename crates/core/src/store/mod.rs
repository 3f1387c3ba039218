//! SQLite-backed store for versioned cache partitions.
//!
//! This module provides the persistent cache the worker reads and writes
//! through, using async access via tokio-rusqlite. It supports:
//!
//! - Named, versioned partitions deleted wholesale at version cutover
//! - Response snapshots keyed by request identity (method + URL)
//! - Explicit-order union lookups across partitions
//! - Insertion-order pruning of the Runtime partition
//! - An auxiliary diagnostic store (debug logs, pending actions)

pub mod connection;
pub mod debug;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod partitions;

pub use crate::Error;

pub use connection::CacheStore;
pub use entries::StoredResponse;
pub use partitions::PartitionStats;
