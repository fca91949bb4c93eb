use arcade_types::{EngineConfig, UserId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;

pub mod console;
pub mod observer;

/// Configuration for the node process.
#[derive(Deserialize, Serialize)]
pub struct Config {
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,

    /// Balances credited at startup (the in-memory ledger starts empty).
    #[serde(default)]
    pub grants: Vec<Grant>,

    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Grant {
    pub user: UserId,
    pub amount: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("grant for user {user} must be > 0")]
    InvalidGrant { user: UserId },
    #[error("engine config is invalid: {0}")]
    Engine(#[from] arcade_types::ConfigError),
}

pub struct ValidatedConfig {
    pub log_level: Level,
    pub json_logs: bool,
    pub grants: Vec<Grant>,
    pub engine: EngineConfig,
}

impl Config {
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let log_level =
            Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;
        if let Some(grant) = self.grants.iter().find(|grant| grant.amount == 0) {
            return Err(ConfigError::InvalidGrant { user: grant.user });
        }
        self.engine.validate()?;

        Ok(ValidatedConfig {
            log_level,
            json_logs: self.json_logs,
            grants: self.grants,
            engine: self.engine,
        })
    }
}
