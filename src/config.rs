use std::collections::HashMap;
use thiserror::Error;

/// Default snapshot staleness bound: one minute of indexer lag behind
/// the newest observed event.
pub const DEFAULT_SNAPSHOT_STALENESS_MS: i64 = 60_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub ledger_api_url: String,
    /// Asset addresses whose USD price is defined as 1.
    pub pegged_assets: Vec<String>,
    pub snapshot_staleness_ms: i64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let ledger_api_url = env_map
            .get("LEDGER_API_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("LEDGER_API_URL".to_string()))?;

        let pegged_assets = env_map
            .get("PEGGED_ASSETS")
            .map(|s| {
                s.split(',')
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let snapshot_staleness_ms = match env_map.get("SNAPSHOT_STALENESS_MS") {
            Some(s) => s.parse::<i64>().map_err(|_| {
                ConfigError::InvalidValue(
                    "SNAPSHOT_STALENESS_MS".to_string(),
                    "must be a valid i64".to_string(),
                )
            })?,
            None => DEFAULT_SNAPSHOT_STALENESS_MS,
        };

        Ok(Config {
            port,
            database_path,
            ledger_api_url,
            pegged_assets,
            snapshot_staleness_ms,
        })
    }
}
