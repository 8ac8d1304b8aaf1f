//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, ExistenceBackend, MAX_UPDATE_INTERVAL_SECS, MIN_UPDATE_INTERVAL_SECS, MiddlewareSignal};
use crate::model::state_id;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `db_path`, `api_cache_dir` or `doc_cache_dir` is empty
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - a listed state abbreviation is unknown
    ///
    /// Returns `ConfigError::Missing` if directory signalling has no
    /// `signal_dir`, the shared existence cache has no path, or a search
    /// update mode has no searches.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, path) in [
            ("db_path", &self.db_path),
            ("api_cache_dir", &self.api_cache_dir),
            ("doc_cache_dir", &self.doc_cache_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must not be empty".into() });
            }
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.middleware_signal == MiddlewareSignal::Directory && self.signal_dir.is_none() {
            return Err(ConfigError::Missing {
                field: "signal_dir".into(),
                hint: "Set LEGISYNC_SIGNAL_DIR when LEGISYNC_MIDDLEWARE_SIGNAL=directory".into(),
            });
        }

        if self.existence_cache == ExistenceBackend::Shared && self.existence_cache_path.is_none() {
            return Err(ConfigError::Missing {
                field: "existence_cache_path".into(),
                hint: "Set LEGISYNC_EXISTENCE_CACHE_PATH when LEGISYNC_EXISTENCE_CACHE=shared".into(),
            });
        }

        if let Some(unknown) = self.states.iter().find(|abbr| state_id(abbr).is_none()) {
            return Err(ConfigError::Invalid {
                field: "states".into(),
                reason: format!("unknown state abbreviation '{unknown}'"),
            });
        }

        if self.update_type.uses_searches() && self.searches.iter().all(|q| q.trim().is_empty()) {
            return Err(ConfigError::Missing {
                field: "searches".into(),
                hint: "Set LEGISYNC_SEARCHES when LEGISYNC_UPDATE_TYPE is search or state_search".into(),
            });
        }

        if !(MIN_UPDATE_INTERVAL_SECS..=MAX_UPDATE_INTERVAL_SECS).contains(&self.update_interval_secs) {
            tracing::warn!(
                update_interval_secs = self.update_interval_secs,
                effective_secs = self.update_interval().as_secs(),
                "update_interval_secs outside 3600..86400; clamping"
            );
        }

        Ok(())
    }
}
