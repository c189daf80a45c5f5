//! Tracker configuration and default locations.
//!
//! Everything the engine used to read from shared globals (the trusted
//! frame origin, the record key, the expiry window) is an explicit value here
//! and is handed to constructors.
//!
//! ```toml
//! record_key = "attribution_data"
//! ttl_days = 30
//! child_origin = "https://embeds.beehiiv.com"
//! client_id_field = "ga-client-id"
//! debug = false
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AttributionError, Result};

pub const DEFAULT_RECORD_KEY: &str = "attribution_data";
pub const DEFAULT_TTL_DAYS: i64 = 30;
/// Longest expiry window a config file may ask for.
pub const MAX_TTL_DAYS: i64 = 3650;
pub const DEFAULT_CHILD_ORIGIN: &str = "https://embeds.beehiiv.com";
pub const DEFAULT_CLIENT_ID_FIELD: &str = "ga-client-id";

const APP_DIR: &str = "embed-attribution";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// Store key the record lives under.
    pub record_key: String,
    /// Expiry window for the persisted record, in days.
    pub ttl_days: i64,
    /// The only origin whose frame messages are honored. Exact match.
    pub child_origin: String,
    /// Field scanned for in the outbound queue to find the analytics client id.
    pub client_id_field: String,
    /// Logs the resolved record once initialization completes.
    pub debug: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            record_key: DEFAULT_RECORD_KEY.to_string(),
            ttl_days: DEFAULT_TTL_DAYS,
            child_origin: DEFAULT_CHILD_ORIGIN.to_string(),
            client_id_field: DEFAULT_CLIENT_ID_FIELD.to_string(),
            debug: false,
        }
    }
}

impl TrackerConfig {
    /// Loads configuration from `path`, or from [`default_config_path`] when
    /// `path` is `None`. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };

        if !config_path.exists() {
            return Ok(TrackerConfig::default());
        }

        let content = fs_err::read_to_string(&config_path).map_err(|source| AttributionError::Io {
            context: format!("read config {}", config_path.display()),
            source,
        })?;
        Self::parse(&content, &config_path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: TrackerConfig =
            toml::from_str(content).map_err(|err| AttributionError::ConfigMalformed {
                path: path.to_path_buf(),
                details: err.to_string(),
            })?;
        if !(1..=MAX_TTL_DAYS).contains(&config.ttl_days) {
            return Err(AttributionError::ConfigMalformed {
                path: path.to_path_buf(),
                details: format!(
                    "ttl_days must be between 1 and {}, got {}",
                    MAX_TTL_DAYS, config.ttl_days
                ),
            });
        }
        Ok(config)
    }

    pub fn resolver(&self) -> ResolverConfig {
        ResolverConfig {
            record_key: self.record_key.clone(),
            ttl_days: self.ttl_days,
        }
    }

    pub fn channel(&self) -> ChannelConfig {
        ChannelConfig {
            child_origin: self.child_origin.clone(),
            client_id_field: self.client_id_field.clone(),
        }
    }
}

/// The slice of configuration the resolver needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub record_key: String,
    pub ttl_days: i64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        TrackerConfig::default().resolver()
    }
}

/// The slice of configuration the cross-frame channel needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub child_origin: String,
    pub client_id_field: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        TrackerConfig::default().channel()
    }
}

/// `<config dir>/embed-attribution/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join("config.toml"))
        .ok_or(AttributionError::NoDefaultPath("config file"))
}

/// `<data dir>/embed-attribution/attribution.json`
pub fn default_store_path() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR).join("attribution.json"))
        .ok_or(AttributionError::NoDefaultPath("attribution store"))
}
