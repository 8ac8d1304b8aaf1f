//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (LEGISYNC_*)
//! 2. TOML config file (if LEGISYNC_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::reconcile::{ImportMode, ReconcileOptions};

mod validation;

pub use validation::ConfigError;

/// Shortest allowed pause between daemon passes.
pub const MIN_UPDATE_INTERVAL_SECS: u64 = 3600;

/// Longest allowed pause between daemon passes.
pub const MAX_UPDATE_INTERVAL_SECS: u64 = 86_400;

/// Where change notifications are written after a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MiddlewareSignal {
    #[default]
    None,
    Table,
    Directory,
}

/// Backing store for the existence cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExistenceBackend {
    /// Private to this process.
    #[default]
    Memory,
    /// SQLite file shared by every process on the host.
    Shared,
}

/// Which bills a daemon pass looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    /// Bills on the monitor list.
    #[default]
    Monitored,
    /// Every bill in the configured states.
    State,
    /// Bills matching the configured searches, nationwide.
    Search,
    /// Bills matching the configured searches, per configured state.
    #[serde(rename = "state_search")]
    StateSearch,
}

impl UpdateType {
    /// Whether a pass in this mode runs the configured searches.
    pub fn uses_searches(self) -> bool {
        matches!(self, UpdateType::Search | UpdateType::StateSearch)
    }
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (LEGISYNC_*)
/// 2. TOML config file (if LEGISYNC_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote API key.
    ///
    /// Set via LEGISYNC_API_KEY environment variable.
    /// Required only for pull synchronization.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Remote API base URL.
    ///
    /// Set via LEGISYNC_API_URL environment variable.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Path to the SQLite store.
    ///
    /// Set via LEGISYNC_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Root of the ephemeral API response cache.
    ///
    /// Set via LEGISYNC_API_CACHE_DIR environment variable.
    #[serde(default = "default_api_cache_dir")]
    pub api_cache_dir: PathBuf,

    /// Root of the permanent document cache.
    ///
    /// Set via LEGISYNC_DOC_CACHE_DIR environment variable.
    #[serde(default = "default_doc_cache_dir")]
    pub doc_cache_dir: PathBuf,

    /// Fallback response cache lifetime in seconds.
    ///
    /// Set via LEGISYNC_CACHE_LIFETIME_SECS environment variable.
    #[serde(default = "default_cache_lifetime_secs")]
    pub cache_lifetime_secs: u64,

    /// Request full bill text when a new text stub appears.
    ///
    /// Set via LEGISYNC_WANT_BILL_TEXT environment variable.
    #[serde(default)]
    pub want_bill_text: bool,

    /// Request amendment documents when a new amendment stub appears.
    ///
    /// Set via LEGISYNC_WANT_AMENDMENT environment variable.
    #[serde(default)]
    pub want_amendment: bool,

    /// Request supplement documents when a new supplement stub appears.
    ///
    /// Set via LEGISYNC_WANT_SUPPLEMENT environment variable.
    #[serde(default)]
    pub want_supplement: bool,

    /// Request roll call detail when a new vote stub appears.
    ///
    /// Set via LEGISYNC_WANT_VOTE_DETAILS environment variable.
    #[serde(default = "default_true")]
    pub want_vote_details: bool,

    /// Store empty and zero dates as NULL.
    ///
    /// Set via LEGISYNC_MASSAGE_DATES environment variable.
    #[serde(default)]
    pub massage_dates: bool,

    /// Change notification mode: `none`, `table` or `directory`.
    ///
    /// Set via LEGISYNC_MIDDLEWARE_SIGNAL environment variable.
    #[serde(default)]
    pub middleware_signal: MiddlewareSignal,

    /// Directory receiving signal files in `directory` mode.
    ///
    /// Set via LEGISYNC_SIGNAL_DIR environment variable.
    #[serde(default)]
    pub signal_dir: Option<PathBuf>,

    /// Existence cache backend: `memory` or `shared`.
    ///
    /// Set via LEGISYNC_EXISTENCE_CACHE environment variable.
    #[serde(default)]
    pub existence_cache: ExistenceBackend,

    /// SQLite file used by the `shared` existence cache.
    ///
    /// Set via LEGISYNC_EXISTENCE_CACHE_PATH environment variable.
    #[serde(default)]
    pub existence_cache_path: Option<PathBuf>,

    /// State abbreviations synchronized in `state` update mode.
    ///
    /// Set via LEGISYNC_STATES environment variable (e.g. `[CA,NY]`).
    #[serde(default)]
    pub states: Vec<String>,

    /// Full-text searches run in `search` and `state_search` update modes.
    ///
    /// An entry may override the state (`CA|water`), the relevance cutoff
    /// (`75|water`) or both (`CA,75|water`).
    /// Set via LEGISYNC_SEARCHES environment variable (e.g. `["water rights"]`).
    #[serde(default)]
    pub searches: Vec<String>,

    /// Daemon pass scope: `monitored`, `state`, `search` or `state_search`.
    ///
    /// Set via LEGISYNC_UPDATE_TYPE environment variable.
    #[serde(default)]
    pub update_type: UpdateType,

    /// Which list entries become bill requests: `new`, `changed` or `all`.
    ///
    /// Set via LEGISYNC_IMPORT_MODE environment variable.
    #[serde(default = "default_import_mode")]
    pub import_mode: ImportMode,

    /// Search results at or below this relevance are ignored.
    ///
    /// Set via LEGISYNC_RELEVANCE_CUTOFF environment variable.
    #[serde(default)]
    pub relevance_cutoff: i64,

    /// Seconds between daemon passes, clamped to one hour..one day.
    ///
    /// Set via LEGISYNC_UPDATE_INTERVAL_SECS environment variable.
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,

    /// Pause between bill fetches in milliseconds.
    ///
    /// Set via LEGISYNC_BILL_PAUSE_MS environment variable.
    #[serde(default = "default_bill_pause_ms")]
    pub bill_pause_ms: u64,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via LEGISYNC_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via LEGISYNC_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_url() -> String {
    "https://api.legiscan.com/".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./legisync.sqlite")
}

fn default_api_cache_dir() -> PathBuf {
    PathBuf::from("./cache/api")
}

fn default_doc_cache_dir() -> PathBuf {
    PathBuf::from("./cache/doc")
}

fn default_cache_lifetime_secs() -> u64 {
    3600
}

fn default_import_mode() -> ImportMode {
    ImportMode::Changed
}

fn default_update_interval_secs() -> u64 {
    14_400
}

fn default_bill_pause_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    "legisync/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            db_path: default_db_path(),
            api_cache_dir: default_api_cache_dir(),
            doc_cache_dir: default_doc_cache_dir(),
            cache_lifetime_secs: default_cache_lifetime_secs(),
            want_bill_text: false,
            want_amendment: false,
            want_supplement: false,
            want_vote_details: true,
            massage_dates: false,
            middleware_signal: MiddlewareSignal::None,
            signal_dir: None,
            existence_cache: ExistenceBackend::Memory,
            existence_cache_path: None,
            states: Vec::new(),
            searches: Vec::new(),
            update_type: UpdateType::Monitored,
            import_mode: default_import_mode(),
            relevance_cutoff: 0,
            update_interval_secs: default_update_interval_secs(),
            bill_pause_ms: default_bill_pause_ms(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Pause between daemon passes, clamped to the allowed window.
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(
            self.update_interval_secs
                .clamp(MIN_UPDATE_INTERVAL_SECS, MAX_UPDATE_INTERVAL_SECS),
        )
    }

    /// Pause between consecutive bill fetches.
    pub fn bill_pause(&self) -> Duration {
        Duration::from_millis(self.bill_pause_ms)
    }

    /// Engine toggles derived from this configuration.
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            want_bill_text: self.want_bill_text,
            want_amendment: self.want_amendment,
            want_supplement: self.want_supplement,
            want_vote_details: self.want_vote_details,
            massage_dates: self.massage_dates,
            import_mode: self.import_mode,
            relevance_cutoff: self.relevance_cutoff,
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `LEGISYNC_`
    /// 2. TOML file from `LEGISYNC_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("LEGISYNC_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("LEGISYNC_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check if the API key is available (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the API key is not set.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "api_key".into(),
                hint: "Set LEGISYNC_API_KEY environment variable".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./legisync.sqlite"));
        assert_eq!(config.api_url, "https://api.legiscan.com/");
        assert_eq!(config.cache_lifetime_secs, 3600);
        assert_eq!(config.middleware_signal, MiddlewareSignal::None);
        assert_eq!(config.existence_cache, ExistenceBackend::Memory);
        assert_eq!(config.import_mode, ImportMode::Changed);
        assert!(config.want_vote_details);
        assert!(!config.want_bill_text);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_update_interval_clamped() {
        let config = AppConfig { update_interval_secs: 60, ..Default::default() };
        assert_eq!(config.update_interval(), Duration::from_secs(3600));

        let config = AppConfig { update_interval_secs: 200_000, ..Default::default() };
        assert_eq!(config.update_interval(), Duration::from_secs(86_400));

        let config = AppConfig { update_interval_secs: 7200, ..Default::default() };
        assert_eq!(config.update_interval(), Duration::from_secs(7200));
    }

    #[test]
    fn test_reconcile_options_follow_toggles() {
        let config = AppConfig { want_bill_text: true, massage_dates: true, ..Default::default() };
        let options = config.reconcile_options();
        assert!(options.want_bill_text);
        assert!(options.massage_dates);
        assert!(!options.want_amendment);
    }

    #[test]
    fn test_require_api_key_missing() {
        let config = AppConfig::default();
        assert!(matches!(config.require_api_key(), Err(ConfigError::Missing { .. })));

        let config = AppConfig { api_key: Some(String::new()), ..Default::default() };
        assert!(matches!(config.require_api_key(), Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_require_api_key_present() {
        let config = AppConfig { api_key: Some("test-key".into()), ..Default::default() };
        assert_eq!(config.require_api_key().unwrap(), "test-key");
    }

    #[test]
    fn test_update_type_names() {
        let mode: UpdateType = serde_json::from_str("\"state_search\"").unwrap();
        assert_eq!(mode, UpdateType::StateSearch);
        let mode: UpdateType = serde_json::from_str("\"search\"").unwrap();
        assert!(mode.uses_searches());
        assert!(!UpdateType::State.uses_searches());
    }

    #[test]
    fn test_signal_mode_deserializes_lowercase() {
        let mode: MiddlewareSignal = serde_json::from_str("\"directory\"").unwrap();
        assert_eq!(mode, MiddlewareSignal::Directory);
    }
}
