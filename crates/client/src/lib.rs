//! Client side of the sideout cache worker.
//!
//! This crate provides the request model, the network fetcher, request
//! classification, and the strategy engine that executes the per-request
//! caching policy.

pub mod classify;
pub mod engine;
pub mod fetch;
pub mod request;

pub use classify::Classifier;
pub use engine::StrategyEngine;
pub use fetch::{FetchOptions, FetcherConfig, HttpFetcher, NetworkFetcher, canonicalize};
pub use request::{Destination, FetchRequest};
