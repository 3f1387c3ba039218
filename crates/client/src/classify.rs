//! Request classification.
//!
//! A pure function from (destination, URL, config overrides) to the fetch
//! strategy. Classification never fails: anything the rules don't place
//! falls through to stale-while-revalidate, the most conservative choice.

use regex::Regex;
use url::Url;

use crate::request::{Destination, FetchRequest};
use sideout_core::config::ConfigError;
use sideout_core::{CacheConfig, Strategy};

/// Path suffixes that mark a request as a static asset even when the
/// platform reports no destination for it.
const ASSET_PATH_PATTERN: &str = r"\.(?:js|mjs|css|png|jpe?g|svg|gif|webp|ico|woff2?)$";

/// Compiled classification rules.
#[derive(Debug, Clone)]
pub struct Classifier {
    asset_re: Regex,
    api_marker: String,
    origin_host: String,
    overrides: Vec<(String, Strategy)>,
}

impl Classifier {
    /// Build the classifier from the config registry.
    pub fn new(config: &CacheConfig) -> Result<Self, ConfigError> {
        let asset_re = Regex::new(ASSET_PATH_PATTERN).map_err(|e| ConfigError::Invalid {
            field: "asset pattern".into(),
            reason: e.to_string(),
        })?;
        let origin = Url::parse(&config.app_origin).map_err(|e| ConfigError::Invalid {
            field: "app_origin".into(),
            reason: e.to_string(),
        })?;
        let origin_host = origin.host_str().unwrap_or_default().to_string();
        let overrides = config
            .external_resources
            .iter()
            .map(|r| (r.url.clone(), r.strategy))
            .collect();

        Ok(Self { asset_re, api_marker: config.api_marker.clone(), origin_host, overrides })
    }

    /// Select the strategy for an intercepted request.
    ///
    /// Rule order: exact external override, then document navigations, then
    /// static assets, then API and cross-origin traffic, then the default.
    pub fn classify(&self, request: &FetchRequest) -> Strategy {
        if let Some((_, strategy)) = self.overrides.iter().find(|(url, _)| url.as_str() == request.url.as_str()) {
            return *strategy;
        }

        if request.destination == Destination::Document {
            return Strategy::NetworkFirst;
        }

        if matches!(request.destination, Destination::Script | Destination::Style | Destination::Image)
            || self.asset_re.is_match(request.path())
        {
            return Strategy::CacheFirst;
        }

        if request.path().contains(&self.api_marker) || request.host() != Some(self.origin_host.as_str()) {
            return Strategy::NetworkFirst;
        }

        Strategy::StaleWhileRevalidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::canonicalize;

    fn classifier() -> Classifier {
        Classifier::new(&CacheConfig::default()).unwrap()
    }

    fn req(url: &str, destination: Destination) -> FetchRequest {
        FetchRequest::get(canonicalize(url).unwrap(), destination)
    }

    #[test]
    fn test_document_is_network_first() {
        let strategy = classifier().classify(&req("https://sideout.app/", Destination::Document));
        assert_eq!(strategy, Strategy::NetworkFirst);
    }

    #[test]
    fn test_script_destination_is_cache_first() {
        let strategy = classifier().classify(&req("https://sideout.app/js/draft.js", Destination::Script));
        assert_eq!(strategy, Strategy::CacheFirst);
    }

    #[test]
    fn test_asset_path_without_destination_is_cache_first() {
        let strategy = classifier().classify(&req("https://sideout.app/css/app.css", Destination::Other));
        assert_eq!(strategy, Strategy::CacheFirst);
    }

    #[test]
    fn test_api_path_is_network_first() {
        let strategy = classifier().classify(&req("https://sideout.app/api/games?week=2", Destination::Other));
        assert_eq!(strategy, Strategy::NetworkFirst);
    }

    #[test]
    fn test_cross_origin_is_network_first() {
        let strategy = classifier().classify(&req("https://maps.example.com/tiles/4/2", Destination::Other));
        assert_eq!(strategy, Strategy::NetworkFirst);
    }

    #[test]
    fn test_external_override_beats_generic_rules() {
        // cross-origin stylesheet that would otherwise be CacheFirst by
        // destination; the override pins it anyway, and the font CSS entry
        // pins stale-while-revalidate over the cross-origin rule
        let strategy = classifier().classify(&req(
            "https://fonts.googleapis.com/css2?family=Inter:wght@400;600&display=swap",
            Destination::Style,
        ));
        assert_eq!(strategy, Strategy::StaleWhileRevalidate);
    }

    #[test]
    fn test_unclassified_same_origin_defaults_to_swr() {
        let strategy = classifier().classify(&req("https://sideout.app/standings", Destination::Other));
        assert_eq!(strategy, Strategy::StaleWhileRevalidate);
    }
}
