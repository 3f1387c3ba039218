//! The worker runtime.
//!
//! One `Worker` instance is event-resident for the lifetime of the process.
//! It owns the cache store, the strategy engine, and the registry of
//! controlled clients, and moves through Installing -> Waiting -> Active.

use std::sync::{Arc, RwLock};

use crate::messages::ClientRegistry;
use sideout_client::{FetchRequest, NetworkFetcher, StrategyEngine};
use sideout_core::{CacheConfig, CacheStore, Error, StoredResponse};

/// Lifecycle state of the worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Pre-caching critical and external resources.
    Installing,
    /// Installed; waiting for (or having requested) activation.
    Waiting,
    /// Controlling clients and serving intercepted requests.
    Active,
}

/// The event-resident cache worker.
pub struct Worker {
    pub(crate) config: Arc<CacheConfig>,
    pub(crate) store: CacheStore,
    pub(crate) net: Arc<dyn NetworkFetcher>,
    pub(crate) clients: ClientRegistry,
    engine: StrategyEngine,
    state: RwLock<WorkerState>,
}

impl Worker {
    /// Build a worker over an opened store and a network fetcher.
    pub fn new(config: Arc<CacheConfig>, store: CacheStore, net: Arc<dyn NetworkFetcher>) -> Result<Self, Error> {
        let engine = StrategyEngine::new(store.clone(), Arc::clone(&net), Arc::clone(&config))?;
        Ok(Self {
            config,
            store,
            net,
            clients: ClientRegistry::default(),
            engine,
            state: RwLock::new(WorkerState::Installing),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// The fetch-interception hook: run one intercepted request through the
    /// strategy engine.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<StoredResponse, Error> {
        self.engine.handle(request).await
    }

    /// Registry of connected clients.
    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }
}
