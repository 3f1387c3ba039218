//! Cache-layer configuration with layered loading.
//!
//! The registry is loaded once at worker startup and treated as read-only
//! for the lifetime of the process. Loading precedence (highest wins):
//!
//! 1. Environment variables (SIDEOUT_*)
//! 2. TOML config file (if SIDEOUT_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! Besides the usual knobs (paths, timeouts, user agent) it carries the
//! whole caching table: the cache version token, partition name templates,
//! the critical-resource install manifest, ignore patterns, external
//! resource overrides, and cleanup bounds.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// The three cache partitions managed by the worker.
///
/// Static and Dynamic are created at install; Runtime is created lazily on
/// first write. Every partition name embeds the cache version token, so
/// bumping the token invalidates all prior partitions at activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    /// Critical first-party resources, pre-cached at install.
    Static,
    /// Assets and pre-cached external resources.
    Dynamic,
    /// Responses captured while the app runs; bounded by `CleanupBounds`.
    Runtime,
}

impl Partition {
    fn suffix(self) -> &'static str {
        match self {
            Partition::Static => "static",
            Partition::Dynamic => "dynamic",
            Partition::Runtime => "runtime",
        }
    }
}

/// The fetch strategy applied to an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Serve from cache; only hit the network on a miss.
    CacheFirst,
    /// Hit the network first; fall back to cache on failure.
    NetworkFirst,
    /// Serve a cached copy immediately and refresh it in the background.
    StaleWhileRevalidate,
}

/// A cross-origin resource with a pinned strategy and optional offline
/// fallback path, consulted before the generic classification rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalResource {
    /// Exact absolute URL of the resource.
    pub url: String,
    /// Strategy override for this URL.
    pub strategy: Strategy,
    /// First-party path served when neither cache nor network can.
    #[serde(default)]
    pub fallback: Option<String>,
}

/// Bounds applied to the Runtime partition at activation.
///
/// `max_age_days` is declared for parity with the cleanup table but is not
/// enforced; only the entry-count bound is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CleanupBounds {
    pub max_age_days: u32,
    pub max_entries: usize,
}

impl Default for CleanupBounds {
    fn default() -> Self {
        Self { max_age_days: 30, max_entries: 50 }
    }
}

/// Compiled ignore patterns; matching URLs bypass interception entirely.
#[derive(Debug, Clone)]
pub struct IgnoreList {
    patterns: Vec<Regex>,
}

impl IgnoreList {
    /// Check whether a full request URL matches any ignore pattern.
    pub fn matches(&self, url: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(url))
    }
}

/// Cache-layer configuration, initialized once before any other component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache version token embedded in every partition name.
    ///
    /// Exactly one token is active system-wide; activation deletes every
    /// partition whose name embeds a different one.
    #[serde(default = "default_version")]
    pub version: String,

    /// Prefix shared by all partition names.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Path to the SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the app is served from; critical paths resolve against it and
    /// requests to other hosts classify as cross-origin.
    #[serde(default = "default_app_origin")]
    pub app_origin: String,

    /// Hosting base path, used to compute the window URL the notification
    /// bridge opens.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// User-Agent string for worker-initiated fetches.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Deadline for a single network attempt, in milliseconds. On expiry
    /// the in-flight fetch is aborted and treated as a failure.
    #[serde(default = "default_network_timeout_ms")]
    pub network_timeout_ms: u64,

    /// Deadline for a cache lookup, in milliseconds. A lookup that exceeds
    /// it counts as a miss.
    #[serde(default = "default_cache_lookup_timeout_ms")]
    pub cache_lookup_timeout_ms: u64,

    /// Delay before the single retry of a failed critical-resource fetch.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Path fragment identifying API requests.
    #[serde(default = "default_api_marker")]
    pub api_marker: String,

    /// Ordered first-party paths pre-cached into Static at install.
    #[serde(default = "default_critical_resources")]
    pub critical_resources: Vec<String>,

    /// Regexes over the full request URL that bypass interception.
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// External resources with pinned strategies, pre-cached into Dynamic.
    #[serde(default = "default_external_resources")]
    pub external_resources: Vec<ExternalResource>,

    /// Runtime partition bounds, applied at activation.
    #[serde(default)]
    pub cleanup: CleanupBounds,
}

fn default_version() -> String {
    "v3".into()
}

fn default_cache_prefix() -> String {
    "sideout".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./sideout-cache.sqlite")
}

fn default_app_origin() -> String {
    "https://sideout.app".into()
}

fn default_scope() -> String {
    "/".into()
}

fn default_user_agent() -> String {
    "sideout-worker/0.1".into()
}

fn default_network_timeout_ms() -> u64 {
    5_000
}

fn default_cache_lookup_timeout_ms() -> u64 {
    1_000
}

fn default_retry_delay_ms() -> u64 {
    10_000
}

fn default_api_marker() -> String {
    "/api/".into()
}

fn default_critical_resources() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/offline.html",
        "/css/app.css",
        "/css/icons-offline.css",
        "/js/app.js",
        "/js/roster.js",
        "/js/draft.js",
        "/js/schedule.js",
        "/manifest.json",
        "/img/logo.svg",
        "/img/icons/icon-192.png",
        "/img/icons/icon-512.png",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_ignore_patterns() -> Vec<String> {
    [
        r"^chrome-extension://",
        r"^moz-extension://",
        r"google-analytics\.com",
        r"googletagmanager\.com",
        r"/analytics/beacon",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_external_resources() -> Vec<ExternalResource> {
    vec![
        ExternalResource {
            url: "https://cdn.jsdelivr.net/npm/bootstrap-icons@1.11.3/font/bootstrap-icons.min.css".into(),
            strategy: Strategy::CacheFirst,
            fallback: Some("/css/icons-offline.css".into()),
        },
        ExternalResource {
            url: "https://fonts.googleapis.com/css2?family=Inter:wght@400;600&display=swap".into(),
            strategy: Strategy::StaleWhileRevalidate,
            fallback: None,
        },
    ]
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache_prefix: default_cache_prefix(),
            db_path: default_db_path(),
            app_origin: default_app_origin(),
            scope: default_scope(),
            user_agent: default_user_agent(),
            network_timeout_ms: default_network_timeout_ms(),
            cache_lookup_timeout_ms: default_cache_lookup_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            api_marker: default_api_marker(),
            critical_resources: default_critical_resources(),
            ignore_patterns: default_ignore_patterns(),
            external_resources: default_external_resources(),
            cleanup: CleanupBounds::default(),
        }
    }
}

impl CacheConfig {
    /// Network attempt deadline as a Duration.
    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }

    /// Cache lookup deadline as a Duration.
    pub fn cache_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_lookup_timeout_ms)
    }

    /// Critical-retry delay as a Duration.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Name of one partition under the current version token.
    pub fn partition_name(&self, partition: Partition) -> String {
        format!("{}-{}-{}", self.cache_prefix, partition.suffix(), self.version)
    }

    /// The complete set of partition names valid under the current token.
    pub fn partition_names(&self) -> Vec<String> {
        [Partition::Static, Partition::Dynamic, Partition::Runtime]
            .iter()
            .map(|p| self.partition_name(*p))
            .collect()
    }

    /// Ordered partition search list for union lookups: most volatile first,
    /// so a revalidated Runtime copy shadows the install-time snapshot.
    pub fn lookup_order(&self) -> [String; 3] {
        [
            self.partition_name(Partition::Runtime),
            self.partition_name(Partition::Dynamic),
            self.partition_name(Partition::Static),
        ]
    }

    /// Compile the ignore patterns. Patterns are checked at validation, so
    /// this only fails on a config that skipped `load()`.
    pub fn ignore_list(&self) -> Result<IgnoreList, ConfigError> {
        let patterns = self
            .ignore_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::Invalid {
                    field: "ignore_patterns".into(),
                    reason: format!("{p}: {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IgnoreList { patterns })
    }

    /// Find the override entry for an exact external URL.
    pub fn external_override(&self, url: &str) -> Option<&ExternalResource> {
        self.external_resources.iter().find(|r| r.url == url)
    }

    /// Find an external entry with an offline fallback on the given host.
    pub fn external_fallback_for_host(&self, host: &str) -> Option<&ExternalResource> {
        self.external_resources
            .iter()
            .filter(|r| r.fallback.is_some())
            .find(|r| url::Url::parse(&r.url).ok().and_then(|u| u.host_str().map(|h| h == host)) == Some(true))
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SIDEOUT_`
    /// 2. TOML file from `SIDEOUT_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be read or parsed, or if
    /// validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SIDEOUT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SIDEOUT_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
