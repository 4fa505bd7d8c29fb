//! Error types for realtime hub connections.

use sojourn_core::ClientError;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RealtimeError {
    /// No usable session credentials; the connect attempt is aborted without
    /// entering a retry loop.
    #[error("No usable session credentials for realtime connect")]
    AuthenticationUnavailable,

    /// A send was attempted without a connection and the one retry-connect
    /// cycle also failed.
    #[error("Connection unavailable: {reason}")]
    ConnectionUnavailable { reason: String },

    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("Payload serialization failed: {reason}")]
    Serialization { reason: String },

    #[error(transparent)]
    Credentials(#[from] ClientError),
}
