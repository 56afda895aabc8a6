//! Runtime configuration
//!
//! Values come from defaults, then environment variables. The CLI applies
//! its flags on top.

use crate::report::DEFAULT_PURGE_DELAY;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB: &str = "ANALYSTAI_DB";
pub const ENV_API_BASE_URL: &str = "ANALYSTAI_API_BASE_URL";
pub const ENV_API_KEY: &str = "ANALYSTAI_API_KEY";
pub const ENV_PURGE_DELAY_SECS: &str = "ANALYSTAI_PURGE_DELAY_SECS";

pub const DEFAULT_API_BASE_URL: &str = "https://api.example.com";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_MAX_POLLS: u32 = 150;

/// Remote extraction API settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    /// Sent as a bearer token
    pub api_key: String,
    /// Delay between status checks
    pub poll_interval: Duration,
    /// Status checks before giving up
    pub max_polls: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: String::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite database holding the persisted store
    pub db_path: PathBuf,
    /// Delay between sign-out and purge
    pub purge_delay: Duration,
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from the process environment or use defaults
    pub fn load_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Unparseable numeric values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup(ENV_DB)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let purge_delay = match lookup(ENV_PURGE_DELAY_SECS) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    tracing::warn!("Ignoring invalid {}={:?}", ENV_PURGE_DELAY_SECS, raw);
                    DEFAULT_PURGE_DELAY
                }
            },
            None => DEFAULT_PURGE_DELAY,
        };

        let mut api = ApiConfig::default();
        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|v| !v.is_empty()) {
            api.base_url = url;
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            api.api_key = key;
        }

        Self {
            db_path,
            purge_delay,
            api,
        }
    }
}

/// Get the default database path (~/.local/share/analystai/analystai.db)
pub fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("analystai").join("analystai.db")
}
