//! API server configuration.

use chrono::Duration;
use thiserror::Error;

use bazaar_core::auth::jwt::{ACCESS_TOKEN_EXPIRY_MINUTES, resolve_jwt_secret};
use bazaar_core::auth::password::BCRYPT_COST;
use bazaar_core::auth::refresh::REFRESH_TOKEN_EXPIRY_DAYS;

/// Configuration errors, fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("Invalid auth configuration: {0}")]
    Auth(#[from] bazaar_core::auth::AuthError),
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Access token lifetime.
    pub access_token_ttl: Duration,
    /// Refresh token lifetime.
    pub refresh_token_ttl: Duration,
    /// bcrypt cost factor.
    pub bcrypt_cost: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3100".into(),
            database_url: "postgres://localhost:5432/bazaar".into(),
            jwt_secret: String::new(),
            access_token_ttl: Duration::minutes(ACCESS_TOKEN_EXPIRY_MINUTES),
            refresh_token_ttl: Duration::days(REFRESH_TOKEN_EXPIRY_DAYS),
            bcrypt_cost: BCRYPT_COST,
        }
    }
}

/// Parse a non-negative count of `unit`s. Counts that overflow [`Duration`]
/// are rejected like any other bad number.
fn parse_duration(
    var: &'static str,
    value: String,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|n| *n >= 0)
        .and_then(unit)
        .ok_or(ConfigError::InvalidNumber { var, value })
}

fn env_duration(
    var: &'static str,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Option<Duration>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => parse_duration(var, value, unit).map(Some),
        Err(_) => Ok(None),
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                   | Default                               |
    /// |----------------------------|---------------------------------------|
    /// | `BIND_ADDR`                | `127.0.0.1:3100`                      |
    /// | `DATABASE_URL`             | `postgres://localhost:5432/bazaar`    |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file       |
    /// | `ACCESS_TOKEN_TTL_MINUTES` | `20`                                  |
    /// | `REFRESH_TOKEN_TTL_DAYS`   | `30`                                  |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            jwt_secret: resolve_jwt_secret(),
            access_token_ttl: env_duration("ACCESS_TOKEN_TTL_MINUTES", Duration::try_minutes)?
                .unwrap_or(defaults.access_token_ttl),
            refresh_token_ttl: env_duration("REFRESH_TOKEN_TTL_DAYS", Duration::try_days)?
                .unwrap_or(defaults.refresh_token_ttl),
            bcrypt_cost: defaults.bcrypt_cost,
        })
    }
}
