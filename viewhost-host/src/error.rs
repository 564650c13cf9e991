//! Error types for the application host.

use thiserror::Error;
use viewhost_channel::ChannelError;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("viewport error: {0}")]
    Viewport(#[from] ViewportError),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Failures reported by the sandbox-execution engine.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox engine used before initialization")]
    NotInitialized,

    #[error("sandbox engine initialization failed: {0}")]
    Initialization(String),

    #[error("failed to load frame into container '{container}': {message}")]
    Load { container: String, message: String },

    #[error("frame execution failed: {0}")]
    Execution(String),
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template error: {0}")]
    Tera(#[from] tera::Error),

    #[error("template parameters must be an object, got {0}")]
    InvalidParams(String),
}

#[derive(Debug, Error)]
pub enum ViewportError {
    #[error("viewport not mounted")]
    NotMounted,

    #[error("no '.{class}' container in rendered fragment")]
    ContainerNotFound { class: String },

    #[error("unknown container: {0}")]
    UnknownContainer(String),
}

/// Why a capability call had no effect. Never crosses the sandbox boundary:
/// the tamed wrapper logs it and hands the sandbox a null result.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("capability unavailable: {0}")]
    Unavailable(String),

    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}
