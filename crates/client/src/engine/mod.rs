//! The strategy engine: per-request read/write/race policy.
//!
//! Every intercepted request runs through `StrategyEngine::handle`, which
//! either passes it through untouched (ignore patterns) or classifies it
//! and executes one of the three strategies against the cache store and the
//! network. Cache writes are best-effort: a failed write is logged and
//! swallowed, the response is still served.

mod fallback;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::classify::Classifier;
use crate::fetch::{FetchOptions, NetworkFetcher};
use crate::request::FetchRequest;
use sideout_core::config::IgnoreList;
use sideout_core::{CacheConfig, CacheStore, Error, Partition, Strategy, StoredResponse};

/// Executes the per-request caching strategies.
pub struct StrategyEngine {
    store: CacheStore,
    net: Arc<dyn NetworkFetcher>,
    config: Arc<CacheConfig>,
    classifier: Classifier,
    ignore: IgnoreList,
    lookup_order: [String; 3],
}

impl StrategyEngine {
    /// Build the engine from the config registry.
    pub fn new(store: CacheStore, net: Arc<dyn NetworkFetcher>, config: Arc<CacheConfig>) -> Result<Self, Error> {
        let classifier = Classifier::new(&config).map_err(|e| Error::Config(e.to_string()))?;
        let ignore = config.ignore_list().map_err(|e| Error::Config(e.to_string()))?;
        let lookup_order = config.lookup_order();
        Ok(Self { store, net, config, classifier, ignore, lookup_order })
    }

    /// The fetch-interception hook.
    ///
    /// Ignored URLs go straight to the network: no cache read, no cache
    /// write, and network errors propagate unchanged.
    pub async fn handle(&self, request: &FetchRequest) -> Result<StoredResponse, Error> {
        if self.ignore.matches(request.url.as_str()) {
            trace!(url = %request.url, "ignored URL, passing through");
            return self.net.fetch(request, FetchOptions::default()).await;
        }

        let strategy = self.classifier.classify(request);
        trace!(url = %request.url, ?strategy, "classified");

        match strategy {
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
        }
    }

    /// Serve from cache; only on a miss fetch the network, caching a 200
    /// into the Dynamic partition.
    async fn cache_first(&self, request: &FetchRequest) -> Result<StoredResponse, Error> {
        if let Some(hit) = self.lookup_cached(request).await {
            return Ok(hit);
        }

        match self.net.fetch(request, FetchOptions::default()).await {
            Ok(response) => {
                if response.is_success() {
                    self.write_through(Partition::Dynamic, request, &response).await;
                }
                Ok(response)
            }
            Err(err) => self.offline_fallback(request, err).await,
        }
    }

    /// Fetch the network first, caching a 200 into the Runtime partition;
    /// on any failure fall back to cache, then to the typed fallbacks.
    async fn network_first(&self, request: &FetchRequest) -> Result<StoredResponse, Error> {
        match self.net.fetch(request, FetchOptions::default()).await {
            Ok(response) => {
                if response.is_success() {
                    self.write_through(Partition::Runtime, request, &response).await;
                }
                Ok(response)
            }
            Err(err) => {
                if let Some(hit) = self.lookup_cached(request).await {
                    return Ok(hit);
                }
                self.offline_fallback(request, err).await
            }
        }
    }

    /// Serve a cached copy immediately and refresh it in the background;
    /// the served caller never sees the refreshed content.
    async fn stale_while_revalidate(&self, request: &FetchRequest) -> Result<StoredResponse, Error> {
        if let Some(hit) = self.lookup_cached(request).await {
            let _ = self.spawn_revalidation(request.clone());
            return Ok(hit);
        }

        match self.net.fetch(request, FetchOptions::default()).await {
            Ok(response) => {
                if response.is_success() {
                    self.write_through(Partition::Runtime, request, &response).await;
                }
                Ok(response)
            }
            Err(err) => self.offline_fallback(request, err).await,
        }
    }

    /// Union cache lookup bounded by the cache-lookup deadline. A slow or
    /// failing lookup counts as a miss so the request can still progress.
    pub(crate) async fn lookup_cached(&self, request: &FetchRequest) -> Option<StoredResponse> {
        let lookup = self.store.lookup(&request.method, request.url.as_str(), &self.lookup_order);
        match tokio::time::timeout(self.config.cache_lookup_timeout(), lookup).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!(url = %request.url, error = %e, "cache lookup failed, treating as miss");
                None
            }
            Err(_) => {
                warn!(url = %request.url, "cache lookup timed out, treating as miss");
                None
            }
        }
    }

    /// Best-effort cache write: a failure is logged and swallowed because
    /// the response must still reach the page.
    async fn write_through(&self, partition: Partition, request: &FetchRequest, response: &StoredResponse) {
        let name = self.config.partition_name(partition);
        if let Err(e) = self.store.put(&name, &request.method, request.url.as_str(), response).await {
            warn!(url = %request.url, partition = %name, error = %e, "cache write failed");
        }
    }

    /// Background refresh for stale-while-revalidate. The serving path
    /// never awaits the returned handle; the refreshed content is only
    /// visible to later requests.
    fn spawn_revalidation(&self, request: FetchRequest) -> JoinHandle<()> {
        let store = self.store.clone();
        let net = Arc::clone(&self.net);
        let partition = self.config.partition_name(Partition::Runtime);
        tokio::spawn(async move {
            match net.fetch(&request, FetchOptions::default()).await {
                Ok(response) if response.is_success() => {
                    if let Err(e) = store.put(&partition, &request.method, request.url.as_str(), &response).await {
                        warn!(url = %request.url, error = %e, "revalidation write failed");
                    }
                }
                Ok(response) => {
                    trace!(url = %request.url, status = response.status, "revalidation returned non-success")
                }
                Err(e) => trace!(url = %request.url, error = %e, "revalidation fetch failed"),
            }
        })
    }

    pub(crate) fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &CacheStore {
        &self.store
    }

    pub(crate) fn search_order(&self) -> &[String] {
        &self.lookup_order
    }
}
