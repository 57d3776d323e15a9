use std::{env, fmt::Display, num::NonZeroU32, str::FromStr};

use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
#[error("Invalid {key} value {value:?}: {reason}")]
pub struct ConfigError {
    key: &'static str,
    value: String,
    reason: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub cors_origin: String,
    pub bind_addr: String,
    pub pool_size: NonZeroU32,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: try_load("DATABASE_URL", "tuiter.db")?,
            jwt_secret: try_load("JWT_SECRET", "dev-secret-change-me")?,
            cors_origin: try_load("CORS_ORIGIN", "http://localhost:3000")?,
            bind_addr: try_load("BIND_ADDR", "0.0.0.0:4000")?,
            pool_size: try_load("DB_POOL_SIZE", "8")?,
        })
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    match value.parse() {
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(ConfigError {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}
