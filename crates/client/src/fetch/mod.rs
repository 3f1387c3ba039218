//! Network access for the worker.
//!
//! Strategies and the install phase reach the network through the
//! `NetworkFetcher` trait; `HttpFetcher` is the real implementation over
//! reqwest. Every attempt runs under a deadline: when it expires the
//! in-flight request future is dropped, which aborts the transfer, and the
//! attempt is reported as a timeout failure.

pub mod url;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

pub use url::{UrlError, canonicalize};

use crate::request::FetchRequest;
use sideout_core::{Error, StoredResponse};

/// Per-attempt fetch options.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Ask intermediaries for a fresh copy (install-time critical fetches).
    pub cache_bust: bool,
    /// Drop the page's custom request headers (cross-origin install fetches,
    /// where forwarded headers would force a preflight).
    pub strip_headers: bool,
}

/// Network seam between the strategies and the HTTP client.
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
    /// Perform one network attempt for the request.
    ///
    /// Returns a response snapshot for any HTTP status; `Err` means the
    /// attempt itself failed (DNS, connect, TLS, read, or deadline).
    async fn fetch(&self, request: &FetchRequest, opts: FetchOptions) -> Result<StoredResponse, Error>;
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// User agent string for worker-initiated requests.
    pub user_agent: String,
    /// Deadline for one attempt.
    pub timeout: Duration,
    /// Maximum number of redirects to follow.
    pub max_redirects: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self { user_agent: "sideout-worker/0.1".to_string(), timeout: Duration::from_millis(5_000), max_redirects: 5 }
    }
}

/// HTTP fetcher over reqwest.
pub struct HttpFetcher {
    http: Client,
    config: FetcherConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetcherConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    async fn attempt(&self, request: &FetchRequest, opts: FetchOptions) -> Result<StoredResponse, Error> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("unsupported method: {}", request.method)))?;

        let mut builder = self.http.request(method, request.url.as_str());

        if !opts.strip_headers {
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
        }
        if opts.cache_bust {
            builder = builder.header("Cache-Control", "no-cache").header("Pragma", "no-cache");
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("{}: {e}", request.url)))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response body: {e}")))?
            .to_vec();

        tracing::debug!(url = %request.url, status, bytes = body.len(), "fetched");

        Ok(StoredResponse { status, headers, body })
    }
}

#[async_trait]
impl NetworkFetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest, opts: FetchOptions) -> Result<StoredResponse, Error> {
        match tokio::time::timeout(self.config.timeout, self.attempt(request, opts)).await {
            Ok(result) => result,
            Err(_) => Err(Error::FetchTimeout(format!(
                "{} exceeded {}ms",
                request.url,
                self.config.timeout.as_millis()
            ))),
        }
    }
}
