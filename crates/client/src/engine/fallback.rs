//! Typed offline fallbacks.
//!
//! When neither cache nor network can produce a response, a small set of
//! request classes get a synthetic answer instead of a failed fetch:
//! documents get the cached app shell, the font-icon stylesheet gets a
//! local substitute, images get an empty success, API calls get a 503
//! JSON body. Everything else propagates the original failure.

use tracing::debug;
use url::Url;

use super::StrategyEngine;
use crate::request::{Destination, FetchRequest};
use sideout_core::{Error, StoredResponse};

/// Path of the page shell served to offline document requests.
const APP_SHELL_PATH: &str = "/index.html";

impl StrategyEngine {
    /// The shared error-fallback procedure.
    pub(crate) async fn offline_fallback(&self, request: &FetchRequest, err: Error) -> Result<StoredResponse, Error> {
        debug!(url = %request.url, error = %err, "entering offline fallback");

        if request.destination == Destination::Document {
            if let Some(shell) = self.cached_first_party(APP_SHELL_PATH).await {
                return Ok(shell);
            }
            return Err(err);
        }

        if let Some(host) = request.host()
            && let Some(entry) = self.config().external_fallback_for_host(host)
            && let Some(path) = entry.fallback.clone()
        {
            if let Some(cached) = self.cached_first_party(&path).await {
                return Ok(cached);
            }
            return Ok(empty_stylesheet());
        }

        if request.destination == Destination::Image {
            return Ok(empty_success());
        }

        if request.path().contains(&self.config().api_marker) {
            return Ok(api_offline_response());
        }

        Err(err)
    }

    /// Look up a first-party path in the cache, resolved against the app
    /// origin. Lookup failures count as absent.
    async fn cached_first_party(&self, path: &str) -> Option<StoredResponse> {
        let url = Url::parse(&self.config().app_origin).ok()?.join(path).ok()?;
        self.store()
            .lookup("GET", url.as_str(), self.search_order())
            .await
            .ok()
            .flatten()
    }
}

/// Empty stylesheet for the font-icon host when even the local substitute
/// is missing; keeps the page from waiting on a dead stylesheet link.
fn empty_stylesheet() -> StoredResponse {
    StoredResponse::with_content_type(200, "text/css", Vec::new())
}

/// Empty-but-success response for offline images, avoiding broken-image UI.
fn empty_success() -> StoredResponse {
    StoredResponse { status: 200, headers: Vec::new(), body: Vec::new() }
}

/// Structured 503 body for offline API calls.
fn api_offline_response() -> StoredResponse {
    let body = serde_json::json!({
        "error": "Offline",
        "message": "The network is unreachable and no cached copy of this resource exists.",
    });
    let bytes = serde_json::to_vec(&body).unwrap_or_default();
    StoredResponse::with_content_type(503, "application/json", bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_offline_body_shape() {
        let response = api_offline_response();
        assert_eq!(response.status, 503);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["error"], "Offline");
    }

    #[test]
    fn test_empty_success_has_no_headers() {
        let response = empty_success();
        assert_eq!(response.status, 200);
        assert!(response.headers.is_empty());
        assert!(response.body.is_empty());
    }
}
