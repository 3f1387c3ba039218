//! Install and activate phases.
//!
//! Install pre-caches the critical first-party paths into the Static
//! partition and the configured external resources into Dynamic; every
//! fetch outcome is independent, so a partial failure never fails the
//! phase. Activate reconciles live partitions against the current cache
//! version, prunes the Runtime partition, and claims connected clients.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::worker::{Worker, WorkerState};
use sideout_client::{Destination, FetchOptions, FetchRequest, NetworkFetcher};
use sideout_core::{CacheStore, Error, Partition};

impl Worker {
    /// Run the install phase.
    ///
    /// Blocks until every pre-cache attempt has settled (the install
    /// barrier), but not on critical-resource retries, which run detached.
    /// Ends by requesting immediate activation.
    pub async fn install(&self) -> Result<(), Error> {
        self.set_state(WorkerState::Installing);
        let static_name = self.config.partition_name(Partition::Static);
        let dynamic_name = self.config.partition_name(Partition::Dynamic);
        info!(version = %self.config.version, "installing: pre-caching resources");

        self.store.open_partition(&static_name).await?;
        self.store.open_partition(&dynamic_name).await?;

        let origin = Url::parse(&self.config.app_origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let mut tasks = JoinSet::new();

        for path in &self.config.critical_resources {
            let url = match origin.join(path) {
                Ok(url) => url,
                Err(e) => {
                    warn!(path = %path, error = %e, "skipping unresolvable critical path");
                    continue;
                }
            };
            tasks.spawn(precache_critical(
                self.store.clone(),
                Arc::clone(&self.net),
                static_name.clone(),
                url,
                self.config.retry_delay(),
            ));
        }

        for resource in &self.config.external_resources {
            let url = match Url::parse(&resource.url) {
                Ok(url) => url,
                Err(e) => {
                    warn!(url = %resource.url, error = %e, "skipping unparsable external resource");
                    continue;
                }
            };
            tasks.spawn(precache_external(self.store.clone(), Arc::clone(&self.net), dynamic_name.clone(), url));
        }

        while tasks.join_next().await.is_some() {}

        // immediate-activation request: do not sit in Waiting for the host
        self.set_state(WorkerState::Waiting);
        info!("install complete, requested immediate activation");
        Ok(())
    }

    /// Run the activate phase: version cutover, Runtime pruning, claiming.
    pub async fn activate(&self) -> Result<(), Error> {
        let current = self.config.partition_names();
        let deleted = self.store.delete_non_current_partitions(&current).await?;

        let runtime = self.config.partition_name(Partition::Runtime);
        let pruned = self.store.prune_oldest_entries(&runtime, self.config.cleanup.max_entries).await?;

        let claimed = self.clients.claim_all();
        self.set_state(WorkerState::Active);
        info!(deleted, pruned, claimed, version = %self.config.version, "activated");
        Ok(())
    }

    /// Force immediate activation if the worker is not active yet.
    pub async fn skip_waiting(&self) -> Result<(), Error> {
        if self.state() != WorkerState::Active {
            self.activate().await?;
        }
        Ok(())
    }
}

/// Fetch one resource and store a 200 into the partition; a non-success
/// status counts as a failure.
async fn fetch_and_store(
    store: &CacheStore, net: &dyn NetworkFetcher, partition: &str, request: &FetchRequest, opts: FetchOptions,
) -> Result<(), Error> {
    let response = net.fetch(request, opts).await?;
    if !response.is_success() {
        return Err(Error::Network(format!("{}: status {}", request.url, response.status)));
    }
    store.put(partition, &request.method, request.url.as_str(), &response).await
}

/// Pre-cache one critical path with an uncached fetch. On failure schedule
/// exactly one detached retry after the configured delay.
async fn precache_critical(
    store: CacheStore, net: Arc<dyn NetworkFetcher>, partition: String, url: Url, retry_delay: std::time::Duration,
) {
    let request = FetchRequest::get(url, Destination::Other);
    let opts = FetchOptions { cache_bust: true, strip_headers: false };

    if let Err(e) = fetch_and_store(&store, net.as_ref(), &partition, &request, opts).await {
        warn!(url = %request.url, error = %e, "critical resource fetch failed, scheduling one retry");
        tokio::spawn(async move {
            tokio::time::sleep(retry_delay).await;
            match fetch_and_store(&store, net.as_ref(), &partition, &request, opts).await {
                Ok(()) => info!(url = %request.url, "critical resource cached on retry"),
                Err(e) => warn!(url = %request.url, error = %e, "critical resource retry failed"),
            }
        });
    }
}

/// Pre-cache one external resource without forwarding custom headers (a
/// forwarded header set would force a preflight). Failures are dropped.
async fn precache_external(store: CacheStore, net: Arc<dyn NetworkFetcher>, partition: String, url: Url) {
    let request = FetchRequest::get(url, Destination::Other);
    let opts = FetchOptions { cache_bust: false, strip_headers: true };

    if let Err(e) = fetch_and_store(&store, net.as_ref(), &partition, &request, opts).await {
        debug!(url = %request.url, error = %e, "external resource pre-cache skipped");
    }
}
