//! # Core Configuration Module
//!
//! Provides configuration management for the subtitle platform core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance holding the settings shared across the core crates. It enforces
//! fail-fast validation so a half-configured core cannot be initialized.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/var/lib/subtitles/catalog.db")
//!     .media_server("http://jellyfin.local:8096", "api-key")
//!     .max_workers(2)
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.page_size, 100);
//! ```

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Default number of remote items fetched per pagination request.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default number of concurrent job workers.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Connection settings for the remote media-library server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaServerConfig {
    /// Base URL of the server, e.g. `http://jellyfin.local:8096`.
    pub base_url: String,
    /// API key used for every request.
    pub api_key: String,
}

/// Core configuration for the subtitle platform.
///
/// Use [`CoreConfig::builder`] to construct instances.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Remote media server connection, if one is configured.
    pub media_server: Option<MediaServerConfig>,

    /// Remote pagination page size.
    pub page_size: u32,

    /// Upper bound on concurrently running job workers.
    pub max_workers: usize,

    /// Target languages assigned to newly discovered libraries.
    pub default_languages: Vec<String>,
}

impl CoreConfig {
    /// Start building a configuration.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    base_url: Option<String>,
    api_key: Option<String>,
    page_size: Option<u32>,
    max_workers: Option<usize>,
    default_languages: Option<Vec<String>>,
}

impl CoreConfigBuilder {
    /// Set the SQLite database path (required).
    pub fn database_path(mut self, path: impl AsRef<Path>) -> Self {
        self.database_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Configure the remote media server connection.
    pub fn media_server(mut self, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL on its own; `api_key` must also be provided.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the API key on its own; `base_url` must also be provided.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the remote pagination page size.
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Override the worker pool size.
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    /// Override the default target languages for new libraries.
    pub fn default_languages(mut self, languages: Vec<String>) -> Self {
        self.default_languages = Some(languages);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the database path is missing, the media
    /// server is only half configured, or a numeric setting is zero.
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self
            .database_path
            .ok_or_else(|| Error::Config("database_path is required".to_string()))?;

        let media_server = match (self.base_url, self.api_key) {
            (Some(base_url), Some(api_key)) => {
                if base_url.trim().is_empty() || api_key.trim().is_empty() {
                    return Err(Error::Config(
                        "media server base_url and api_key must be non-empty".to_string(),
                    ));
                }
                Some(MediaServerConfig { base_url, api_key })
            }
            (None, None) => None,
            _ => {
                return Err(Error::Config(
                    "media server requires both base_url and api_key".to_string(),
                ))
            }
        };

        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(Error::Config("page_size must be positive".to_string()));
        }

        let max_workers = self.max_workers.unwrap_or(DEFAULT_MAX_WORKERS);
        if max_workers == 0 {
            return Err(Error::Config("max_workers must be positive".to_string()));
        }

        let default_languages = self
            .default_languages
            .unwrap_or_else(|| vec!["en".to_string()]);

        Ok(CoreConfig {
            database_path,
            media_server,
            page_size,
            max_workers,
            default_languages,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config = CoreConfig::builder()
            .database_path("catalog.db")
            .build()
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("catalog.db"));
        assert!(config.media_server.is_none());
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.max_workers, DEFAULT_MAX_WORKERS);
        assert_eq!(config.default_languages, vec!["en".to_string()]);
    }

    #[test]
    fn test_full_config() {
        let config = CoreConfig::builder()
            .database_path("catalog.db")
            .media_server("http://jellyfin.local:8096", "secret")
            .page_size(25)
            .max_workers(2)
            .default_languages(vec!["en".to_string(), "es".to_string()])
            .build()
            .unwrap();

        let server = config.media_server.unwrap();
        assert_eq!(server.base_url, "http://jellyfin.local:8096");
        assert_eq!(server.api_key, "secret");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.max_workers, 2);
    }

    #[test]
    fn test_missing_database_path_rejected() {
        let result = CoreConfig::builder().build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_half_configured_media_server_rejected() {
        let result = CoreConfig::builder()
            .database_path("catalog.db")
            .base_url("http://jellyfin.local:8096")
            .build();
        assert!(matches!(result, Err(Error::Config(_))));

        let result = CoreConfig::builder()
            .database_path("catalog.db")
            .api_key("secret")
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_media_server_values_rejected() {
        let result = CoreConfig::builder()
            .database_path("catalog.db")
            .media_server("", "secret")
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = CoreConfig::builder()
            .database_path("catalog.db")
            .max_workers(0)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
