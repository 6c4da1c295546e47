//! Configuration management for the device side.

use lumina_engine::{ConflictPolicy, ParsePolicyError};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATA_PATH: &str = "lumina_game_data.json";

/// Sync configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Where the local document lives
    pub data_path: PathBuf,
    /// Base URL of the remote profile store; `None` runs offline
    pub remote_url: Option<String>,
    /// Bearer key sent with every remote request
    pub remote_key: Option<String>,
    /// Period of the push-only timer; `None` disables it
    pub sync_interval: Option<Duration>,
    pub conflict_policy: ConflictPolicy,
    /// Run a full sync when connectivity comes back
    pub sync_on_reconnect: bool,
    pub http_timeout: Duration,
    pub retry_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            remote_url: None,
            remote_key: None,
            sync_interval: Some(Duration::from_secs(30)),
            conflict_policy: ConflictPolicy::default(),
            sync_on_reconnect: true,
            http_timeout: Duration::from_secs(10),
            retry_attempts: 3,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables, reading `.env` first
    /// if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup. Unset keys keep their
    /// defaults; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(path) = get("LUMINA_DATA_PATH") {
            config.data_path = PathBuf::from(path);
        }
        config.remote_url = get("LUMINA_REMOTE_URL");
        config.remote_key = get("LUMINA_REMOTE_KEY");

        if let Some(raw) = get("LUMINA_SYNC_INTERVAL_SECS") {
            let secs: u64 = parse_number("LUMINA_SYNC_INTERVAL_SECS", &raw)?;
            config.sync_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(raw) = get("LUMINA_CONFLICT_POLICY") {
            config.conflict_policy = raw.parse()?;
        }
        if let Some(raw) = get("LUMINA_SYNC_ON_RECONNECT") {
            config.sync_on_reconnect = parse_bool("LUMINA_SYNC_ON_RECONNECT", &raw)?;
        }
        if let Some(raw) = get("LUMINA_HTTP_TIMEOUT_SECS") {
            let secs: u64 = parse_number("LUMINA_HTTP_TIMEOUT_SECS", &raw)?;
            if secs == 0 {
                return Err(ConfigError::Zero {
                    key: "LUMINA_HTTP_TIMEOUT_SECS",
                });
            }
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = get("LUMINA_RETRY_ATTEMPTS") {
            config.retry_attempts = parse_number("LUMINA_RETRY_ATTEMPTS", &raw)?;
        }

        Ok(config)
    }

    /// Whether a remote store is configured at all.
    pub fn sync_enabled(&self) -> bool {
        self.remote_url.is_some()
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: raw.to_string(),
    })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: raw.to_string(),
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },

    #[error("{key} must be true or false, got '{value}'")]
    InvalidBool { key: &'static str, value: String },

    #[error(transparent)]
    InvalidPolicy(#[from] ParsePolicyError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<SyncConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SyncConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_run_offline() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert!(!config.sync_enabled());
        assert_eq!(config.data_path, PathBuf::from("lumina_game_data.json"));
        assert_eq!(config.conflict_policy, ConflictPolicy::PreferNewer);
    }

    #[test]
    fn reads_every_key() {
        let config = config_from(&[
            ("LUMINA_DATA_PATH", "/tmp/lumina.json"),
            ("LUMINA_REMOTE_URL", "https://profiles.example.com"),
            ("LUMINA_REMOTE_KEY", "secret"),
            ("LUMINA_SYNC_INTERVAL_SECS", "0"),
            ("LUMINA_CONFLICT_POLICY", "remote"),
            ("LUMINA_SYNC_ON_RECONNECT", "off"),
            ("LUMINA_HTTP_TIMEOUT_SECS", "4"),
            ("LUMINA_RETRY_ATTEMPTS", "5"),
        ])
        .unwrap();

        assert!(config.sync_enabled());
        assert_eq!(config.remote_key.as_deref(), Some("secret"));
        assert_eq!(config.sync_interval, None);
        assert_eq!(config.conflict_policy, ConflictPolicy::PreferRemote);
        assert!(!config.sync_on_reconnect);
        assert_eq!(config.http_timeout, Duration::from_secs(4));
        assert_eq!(config.retry_attempts, 5);
    }

    #[test]
    fn empty_values_are_unset() {
        let config = config_from(&[("LUMINA_REMOTE_URL", "  ")]).unwrap();
        assert_eq!(config.remote_url, None);
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            config_from(&[("LUMINA_RETRY_ATTEMPTS", "-1")]).unwrap_err(),
            ConfigError::InvalidNumber {
                key: "LUMINA_RETRY_ATTEMPTS",
                value: "-1".into()
            }
        );
        assert_eq!(
            config_from(&[("LUMINA_HTTP_TIMEOUT_SECS", "0")]).unwrap_err(),
            ConfigError::Zero {
                key: "LUMINA_HTTP_TIMEOUT_SECS"
            }
        );
        assert!(matches!(
            config_from(&[("LUMINA_SYNC_ON_RECONNECT", "maybe")]),
            Err(ConfigError::InvalidBool { .. })
        ));
        assert!(matches!(
            config_from(&[("LUMINA_CONFLICT_POLICY", "newest")]),
            Err(ConfigError::InvalidPolicy(_))
        ));
    }
}
