//! Process configuration read from environment variables.
//!
//! | variable               | default     | notes                               |
//! |------------------------|-------------|-------------------------------------|
//! | `SERVER_ADDRESS`       | `0.0.0.0`   |                                     |
//! | `SERVER_PORT`          | `8080`      | 1..=65535                           |
//! | `DATABASE_DSN`         | unset       | unset selects the in-memory store   |
//! | `ENVIRONMENT`          | development | `production` switches to JSON logs  |
//! | `DB_MAX_CONNECTIONS`   | `100`       |                                     |
//! | `DB_MIN_CONNECTIONS`   | `10`        |                                     |
//! | `DB_MAX_LIFETIME_SECS` | `3600`      |                                     |
//! | `CHECK_TX_TIMEOUT_MS`  | unset       | per-check transaction deadline      |
//!
//! Empty values count as unset. Malformed numbers are errors, not defaults.

use std::time::Duration;

use thiserror::Error;

use crate::engine::EngineConfig;
use crate::store::PoolSettings;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: expected {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Deployment environment.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub server_address: String,
    pub server_port: u16,
    pub database_dsn: Option<String>,
    pub environment: Environment,
    pub pool: PoolSettings,
    pub transaction_timeout: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_address: "0.0.0.0".to_string(),
            server_port: 8080,
            database_dsn: None,
            environment: Environment::Development,
            pool: PoolSettings::default(),
            transaction_timeout: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let server_port = match get("SERVER_PORT") {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) if port > 0 => port,
                _ => return Err(invalid("SERVER_PORT", "a port in 1..=65535", raw)),
            },
            None => defaults.server_port,
        };

        let pool = PoolSettings {
            max_connections: parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), defaults.pool.max_connections)?,
            min_connections: parse_or("DB_MIN_CONNECTIONS", get("DB_MIN_CONNECTIONS"), defaults.pool.min_connections)?,
            max_lifetime: match get("DB_MAX_LIFETIME_SECS") {
                Some(raw) => Duration::from_secs(parse("DB_MAX_LIFETIME_SECS", raw)?),
                None => defaults.pool.max_lifetime,
            },
        };

        let transaction_timeout = match get("CHECK_TX_TIMEOUT_MS") {
            Some(raw) => {
                let ms: u64 = parse("CHECK_TX_TIMEOUT_MS", raw.clone())?;
                if ms == 0 {
                    return Err(invalid("CHECK_TX_TIMEOUT_MS", "a positive number of milliseconds", raw));
                }
                Some(Duration::from_millis(ms))
            }
            None => None,
        };

        Ok(Self {
            server_address: get("SERVER_ADDRESS")
                .map(|s| s.trim().to_string())
                .unwrap_or(defaults.server_address),
            server_port,
            database_dsn: get("DATABASE_DSN"),
            environment: get("ENVIRONMENT")
                .map(|raw| Environment::parse(&raw))
                .unwrap_or(defaults.environment),
            pool,
            transaction_timeout,
        })
    }

    /// `address:port`, ready for a listener bind.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_address, self.server_port)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            transaction_timeout: self.transaction_timeout,
        }
    }
}

fn invalid(var: &'static str, expected: &'static str, value: String) -> ConfigError {
    ConfigError::Invalid { var, expected, value }
}

fn parse<T: std::str::FromStr>(var: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| invalid(var, "a non-negative integer", raw))
}

fn parse_or<T: std::str::FromStr>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(raw) => parse(var, raw),
        None => Ok(default),
    }
}
