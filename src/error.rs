//! Error types for the discord-link client library.

use thiserror::Error;

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DiscordLinkError>;

/// Errors surfaced by the discord-link client.
#[derive(Debug, Error)]
pub enum DiscordLinkError {
    /// Invalid or incomplete client configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// WebSocket transport failure (connect, read, or write).
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// The gateway or the REST API rejected the supplied credentials.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// An operation did not complete within its configured deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Failed to encode or decode a JSON payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The REST API answered with a non-success status code.
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP transport failure from the REST side-channel.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The pipeline lock could not be acquired within the bounded wait.
    #[error("lock acquisition timed out after {0:?}")]
    LockTimeout(std::time::Duration),

    /// An inbound or outbound payload exceeded the configured hard ceiling.
    #[error("payload too large ({size} bytes > {limit} bytes)")]
    PayloadTooLarge { size: usize, limit: usize },

    /// The requested operation is not legal in the current connection state.
    #[error("invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: crate::state::ConnectionState,
        to: crate::state::ConnectionState,
    },
}
