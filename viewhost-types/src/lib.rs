//! Core type definitions for the viewhost application shell.
//!
//! This crate defines the plain data types shared by the channel and host
//! crates:
//! - Application identifiers
//! - Application descriptors as pushed by the backend
//! - Control-channel message names and payloads
//!
//! Nothing here performs I/O.

mod descriptor;
mod ids;
pub mod message;

pub use descriptor::ApplicationDescriptor;
pub use ids::AppId;
pub use message::{ActiveAppsSnapshot, LaunchRequest, SkippedEntry};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding shared types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid application id: {0:?}")]
    InvalidAppId(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}
