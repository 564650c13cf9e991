//! Error types for the channel layer.

use thiserror::Error;

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur in channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The endpoint address is not usable by the transport.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The transport could not be started.
    #[error("transport error: {0}")]
    Transport(String),

    /// The channel was closed.
    #[error("channel closed")]
    Closed,
}
