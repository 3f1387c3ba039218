//! sideout worker entry point.
//!
//! Boots the cache worker: loads configuration, opens the store, runs the
//! install and activate phases, then serves the control-message protocol
//! as line-delimited JSON on stdio. Logging goes to stderr so stdout
//! carries only protocol replies.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

use sideout_client::{FetcherConfig, HttpFetcher};
use sideout_core::{CacheConfig, CacheStore};
use sideout_worker::{ControlReply, ControlRequest, Worker};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = Arc::new(CacheConfig::load()?);
    tracing::info!(version = %config.version, "starting sideout worker");

    let store = CacheStore::open(&config.db_path).await?;
    let net = Arc::new(HttpFetcher::new(FetcherConfig {
        user_agent: config.user_agent.clone(),
        timeout: config.network_timeout(),
        max_redirects: 5,
    })?);

    let worker = Worker::new(Arc::clone(&config), store, net)?;
    worker.install().await?;
    worker.activate().await?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<ControlRequest>(line) {
            Ok(request) => {
                let (tx, rx) = tokio::sync::oneshot::channel();
                worker.handle_message(request, None, Some(tx)).await;
                rx.await.unwrap_or_else(|_| ControlReply::failure("reply channel dropped"))
            }
            Err(e) => ControlReply::failure(format!("unrecognized control message: {e}")),
        };

        println!("{}", serde_json::to_string(&reply)?);
    }

    Ok(())
}
