//! Sandbox-execution engine collaborator.
//!
//! The engine does the actual isolation. The host only decides what goes
//! into a frame: the application's markup, its capability library and the
//! URI policy.

use crate::error::SandboxError;
use crate::library::CapabilityLibrary;
use crate::uri_policy::UriPolicy;
use crate::viewport::ContainerNode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Fixed safety configuration the engine is initialized with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EngineConfig {
    /// Run guest code in ES5 mode instead of translating it server-side.
    pub es5_mode: bool,
    /// Server the engine fetches its policy/translation service from.
    pub policy_server: String,
    pub debug: bool,
    /// Highest known-vulnerability severity the engine accepts, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_acceptable_severity: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            es5_mode: true,
            policy_server: "https://caja.appspot.com/".to_string(),
            debug: false,
            max_acceptable_severity: None,
        }
    }
}

pub trait SandboxEngine: Send {
    fn initialize(&mut self, config: &EngineConfig) -> Result<(), SandboxError>;

    /// Creates an isolated frame bound to `container`.
    fn load(
        &mut self,
        container: &ContainerNode,
        uri_policy: Arc<dyn UriPolicy>,
    ) -> Result<Box<dyn SandboxFrame>, SandboxError>;
}

/// One isolated execution context.
pub trait SandboxFrame: Send {
    /// Supplies the guest source served at `path`.
    fn code(&mut self, path: &str, content_type: &str, source: &str) -> Result<(), SandboxError>;

    /// Supplies the capabilities the guest may call.
    fn api(&mut self, library: Arc<CapabilityLibrary>) -> Result<(), SandboxError>;

    /// Starts guest execution. Returns without waiting for the guest.
    fn run(&mut self) -> Result<(), SandboxError>;

    /// Stops the guest and releases the frame. Idempotent.
    fn dispose(&mut self);
}

/// An engine that has completed initialization. Sessions can only be
/// created from one of these.
pub struct ReadyEngine {
    inner: Box<dyn SandboxEngine>,
}

impl ReadyEngine {
    pub fn initialize(
        mut engine: Box<dyn SandboxEngine>,
        config: &EngineConfig,
    ) -> Result<Self, SandboxError> {
        engine.initialize(config)?;
        info!(
            es5_mode = config.es5_mode,
            policy_server = %config.policy_server,
            debug = config.debug,
            "Sandbox engine initialized"
        );
        Ok(Self { inner: engine })
    }

    pub fn load(
        &mut self,
        container: &ContainerNode,
        uri_policy: Arc<dyn UriPolicy>,
    ) -> Result<Box<dyn SandboxFrame>, SandboxError> {
        self.inner.load(container, uri_policy)
    }
}

impl fmt::Debug for ReadyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReadyEngine")
    }
}
