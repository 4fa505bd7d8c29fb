//! Configuration loading for the Sojourn client.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub chat_endpoint: String,
    pub notification_endpoint: String,
    pub storage_path: PathBuf,
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub cache: CacheTtlConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    pub jitter_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_ms: 1_000,
            max_ms: 30_000,
            multiplier: 2.0,
            jitter_ms: 0,
            max_attempts: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheTtlConfig {
    pub user_id_ttl_ms: u64,
    pub cart_ttl_ms: u64,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            user_id_ttl_ms: 300_000,
            cart_ttl_ms: 60_000,
        }
    }
}

impl ClientConfig {
    /// Load from the path in `SOJOURN_CLIENT_CONFIG`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_env().ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            reason: format!("{}: {}", path.display(), err),
        })?;
        let config: ClientConfig = toml::from_str(&contents).map_err(|err| ConfigError::Parse {
            reason: err.to_string(),
        })?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.chat_endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "chat_endpoint",
                reason: "must not be empty".to_string(),
            });
        }
        if self.notification_endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "notification_endpoint",
                reason: "must not be empty".to_string(),
            });
        }
        if self.storage_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "storage_path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.reconnect.initial_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.initial_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.reconnect.max_ms < self.reconnect.initial_ms {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.max_ms",
                reason: "must be >= initial_ms".to_string(),
            });
        }
        if self.reconnect.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.multiplier",
                reason: "must be >= 1.0".to_string(),
            });
        }
        if self.reconnect.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.max_attempts",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.user_id_ttl_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.user_id_ttl_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.cart_ttl_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.cart_ttl_ms",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("SOJOURN_CLIENT_CONFIG").ok().map(PathBuf::from)
}
