//! Configuration validation rules.
//!
//! This module provides validation logic for `CacheConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::CacheConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl CacheConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - the version token is empty or not name-safe
    /// - a timeout is outside its sane range
    /// - the cleanup entry bound is 0
    /// - an ignore pattern does not compile
    /// - an external resource URL is not an absolute http(s) URL
    /// - a critical resource path is not origin-relative
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.is_empty()
            || !self.version.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(ConfigError::Invalid {
                field: "version".into(),
                reason: "must be a non-empty name-safe token".into(),
            });
        }

        if self.cache_prefix.is_empty() {
            return Err(ConfigError::Invalid { field: "cache_prefix".into(), reason: "must not be empty".into() });
        }

        if self.network_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "network_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.network_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "network_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }
        if self.cache_lookup_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "cache_lookup_timeout_ms".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.cleanup.max_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "cleanup.max_entries".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        match url::Url::parse(&self.app_origin) {
            Ok(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some() => {}
            _ => {
                return Err(ConfigError::Invalid {
                    field: "app_origin".into(),
                    reason: "must be an absolute http(s) origin".into(),
                });
            }
        }

        if !self.scope.starts_with('/') {
            return Err(ConfigError::Invalid { field: "scope".into(), reason: "must start with '/'".into() });
        }

        for path in &self.critical_resources {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid {
                    field: "critical_resources".into(),
                    reason: format!("{path}: paths must start with '/'"),
                });
            }
        }

        self.ignore_list()?;

        for resource in &self.external_resources {
            match url::Url::parse(&resource.url) {
                Ok(u) if matches!(u.scheme(), "http" | "https") => {}
                _ => {
                    return Err(ConfigError::Invalid {
                        field: "external_resources".into(),
                        reason: format!("{}: must be an absolute http(s) URL", resource.url),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExternalResource;
    use crate::config::Strategy;

    #[test]
    fn test_validate_default_config() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_version() {
        let config = CacheConfig { version: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "version"));
    }

    #[test]
    fn test_validate_unsafe_version_token() {
        let config = CacheConfig { version: "v3/../etc".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "version"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = CacheConfig { network_timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "network_timeout_ms"));
    }

    #[test]
    fn test_validate_zero_entry_bound() {
        let mut config = CacheConfig::default();
        config.cleanup.max_entries = 0;
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cleanup.max_entries"));
    }

    #[test]
    fn test_validate_bad_ignore_pattern() {
        let config = CacheConfig { ignore_patterns: vec!["[unclosed".into()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "ignore_patterns"));
    }

    #[test]
    fn test_validate_relative_external_url() {
        let config = CacheConfig {
            external_resources: vec![ExternalResource {
                url: "/css/icons.css".into(),
                strategy: Strategy::CacheFirst,
                fallback: None,
            }],
            ..Default::default()
        };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "external_resources"));
    }

    #[test]
    fn test_validate_bad_origin() {
        let config = CacheConfig { app_origin: "sideout.app".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "app_origin"));
    }

    #[test]
    fn test_validate_relative_critical_path() {
        let config = CacheConfig { critical_resources: vec!["index.html".into()], ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "critical_resources"));
    }
}
