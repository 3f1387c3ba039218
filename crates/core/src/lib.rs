//! Core types and shared functionality for the sideout cache worker.
//!
//! This crate provides:
//! - The cache-layer configuration registry
//! - The SQLite-backed partition store
//! - Unified error types

pub mod config;
pub mod error;
pub mod store;

pub use config::{CacheConfig, Partition, Strategy};
pub use error::Error;
pub use store::{CacheStore, PartitionStats, StoredResponse};
