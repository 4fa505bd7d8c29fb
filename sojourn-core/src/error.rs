//! Error types for Sojourn client operations.
//!
//! Every error here is `Clone`: a single failed fetch behind the
//! deduplication layer must be observable, identically, by every caller
//! that awaited it.

use thiserror::Error;

/// Persistent key-value storage errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage read failed for {key}: {reason}")]
    ReadFailed { key: String, reason: String },

    #[error("Storage write failed for {key}: {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("Storage remove failed for {key}: {reason}")]
    RemoveFailed { key: String, reason: String },
}

/// Session token errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token decode failed: {reason}")]
    DecodeFailed { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration file path (provide a path or set SOJOURN_CLIENT_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file: {reason}")]
    Io { reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Fetch errors surfaced through the cache layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Fetch failed for {key}: {reason}")]
    FetchFailed { key: String, reason: String },
}

/// Top-level error for Sojourn client operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
