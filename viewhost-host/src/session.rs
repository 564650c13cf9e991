//! Sandbox session: one isolated frame per application.
//!
//! A session owns:
//! - the frame the engine created inside the application's container
//! - the application's capability library
//! - the scope tracking channels opened through the `Socket` capability
//!
//! Teardown disposes the frame and closes the scoped channels before
//! returning. Dropping a session tears it down.

use crate::capability::TierSet;
use crate::engine::{ReadyEngine, SandboxFrame};
use crate::error::SandboxError;
use crate::library::{AppContext, CapabilityLibrary, HostServices, SessionScope};
use crate::uri_policy::UriPolicy;
use crate::viewport::ContainerNode;
use std::sync::Arc;
use tracing::{info, warn};
use viewhost_types::{AppId, ApplicationDescriptor};

/// Path the application's markup is served at inside its frame.
pub const ENTRY_PATH: &str = "/";

pub const MARKUP_CONTENT_TYPE: &str = "text/html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    TornDown,
}

pub struct SandboxSession {
    app_id: AppId,
    container: ContainerNode,
    frame: Box<dyn SandboxFrame>,
    library: Arc<CapabilityLibrary>,
    scope: SessionScope,
    state: SessionState,
}

impl SandboxSession {
    /// Loads a frame into `container`, injects the markup and the capability
    /// library, and starts execution.
    pub fn start(
        engine: &mut ReadyEngine,
        descriptor: &ApplicationDescriptor,
        container: ContainerNode,
        tiers: &TierSet,
        services: &HostServices,
        uri_policy: Arc<dyn UriPolicy>,
    ) -> Result<Self, SandboxError> {
        let scope = SessionScope::default();
        let ctx = AppContext {
            descriptor,
            scope: scope.clone(),
        };
        let library = Arc::new(CapabilityLibrary::build(&ctx, tiers, services));

        let mut frame = engine.load(&container, uri_policy)?;
        if let Err(e) = boot_frame(frame.as_mut(), &descriptor.markup, &library) {
            warn!(app_id = %descriptor.id, error = %e, "Session failed to start");
            frame.dispose();
            scope.close();
            return Err(e);
        }

        info!(
            app_id = %descriptor.id,
            container = container.id(),
            capabilities = library.len(),
            "Sandbox session started"
        );
        Ok(Self {
            app_id: descriptor.id.clone(),
            container,
            frame,
            library,
            scope,
            state: SessionState::Running,
        })
    }

    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    pub fn container(&self) -> &ContainerNode {
        &self.container
    }

    pub fn library(&self) -> &Arc<CapabilityLibrary> {
        &self.library
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Channels the application currently holds open.
    pub fn open_channels(&self) -> usize {
        self.scope.channel_count()
    }

    /// Stops the guest and releases everything the session owns. Idempotent.
    pub fn teardown(&mut self) {
        if self.state == SessionState::TornDown {
            return;
        }
        self.frame.dispose();
        self.scope.close();
        self.state = SessionState::TornDown;
        info!(app_id = %self.app_id, "Sandbox session torn down");
    }
}

fn boot_frame(
    frame: &mut dyn SandboxFrame,
    markup: &str,
    library: &Arc<CapabilityLibrary>,
) -> Result<(), SandboxError> {
    frame.code(ENTRY_PATH, MARKUP_CONTENT_TYPE, markup)?;
    frame.api(Arc::clone(library))?;
    frame.run()
}

impl Drop for SandboxSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for SandboxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxSession")
            .field("app_id", &self.app_id)
            .field("container", &self.container)
            .field("state", &self.state)
            .finish()
    }
}
