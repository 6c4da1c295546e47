//! Server settings, read from the environment (and `.env` when present).

use std::env;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_DB_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// PostgreSQL URL of the `player_profiles` database
    pub database_url: String,
    /// API key devices must send as a bearer token; unset allows anyone
    pub auth_secret: Option<String>,
    pub max_db_connections: u32,
}

impl Config {
    /// Defaults for everything but the database.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_url: database_url.into(),
            auth_secret: None,
            max_db_connections: DEFAULT_MAX_DB_CONNECTIONS,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::new(get("DATABASE_URL").ok_or(ConfigError::MissingDatabaseUrl)?);
        if let Some(host) = get("HOST") {
            config.host = host;
        }
        if let Some(raw) = get("PORT") {
            config.port = parse_number("PORT", &raw)?;
        }
        config.auth_secret = get("AUTH_SECRET");
        if let Some(raw) = get("DB_MAX_CONNECTIONS") {
            config.max_db_connections = parse_number("DB_MAX_CONNECTIONS", &raw)?;
            if config.max_db_connections == 0 {
                return Err(ConfigError::InvalidNumber {
                    key: "DB_MAX_CONNECTIONS",
                    value: raw,
                });
            }
        }
        Ok(config)
    }

    /// `host:port` to bind the listener to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: raw.to_string(),
    })
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid {key} value '{value}'")]
    InvalidNumber { key: &'static str, value: String },
}
