//! Sandboxed application host for the viewhost shell.
//!
//! Renders backend-described applications into a scrollable viewport and
//! runs each one in its own sandbox session, exposing only a fixed set of
//! tamed host capabilities.
//!
//! Registry mutation happens in one place, the [`Host`] actor, which drains
//! commands forwarded from the control channel.

mod bootstrap;
mod capability;
pub mod config;
mod engine;
mod error;
pub mod headless;
mod library;
mod notify;
mod registry;
mod session;
mod template;
pub mod uri_policy;
mod value;
mod viewport;

pub use bootstrap::{Collaborators, Host, HostBootstrap, HostCommand, HostHandle};
pub use capability::{Capability, CapabilityTier, TierSet};
pub use config::HostConfig;
pub use engine::{EngineConfig, ReadyEngine, SandboxEngine, SandboxFrame};
pub use error::{CapabilityError, HostError, SandboxError, TemplateError, ViewportError};
pub use library::{AppContext, CapabilityLibrary, HostServices, SessionScope, TamedCapability};
pub use notify::{LogNotifier, Notifier};
pub use registry::{
    AddOutcome, ApplicationRegistry, ReconcileMode, RegistryOptions, SnapshotReport,
};
pub use session::{SandboxSession, SessionState};
pub use template::{CompiledTemplate, TemplateEngine, TeraTemplates};
pub use uri_policy::{UriPolicy, UriPolicyConfig};
pub use value::{GuestFunction, SandboxValue};
pub use viewport::{ContainerNode, ItemNav, Viewport, ViewportLayout};
