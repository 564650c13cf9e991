//! In-process collaborators for running the host without a UI.
//!
//! Each collaborator shares its state through a cloneable probe, so the
//! caller can keep a probe after handing the collaborator to the host and
//! inspect what the host did with it.

use crate::engine::{EngineConfig, SandboxEngine, SandboxFrame};
use crate::error::{SandboxError, ViewportError};
use crate::library::CapabilityLibrary;
use crate::notify::Notifier;
use crate::session::ENTRY_PATH;
use crate::uri_policy::UriPolicy;
use crate::viewport::{ContainerNode, Viewport, ViewportLayout};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use viewhost_types::AppId;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ====================================================================
// Engine
// ====================================================================

/// What the engine recorded about one frame.
#[derive(Clone)]
pub struct FrameRecord {
    pub container: ContainerNode,
    pub markup: Option<String>,
    pub library: Option<Arc<CapabilityLibrary>>,
    pub uri_policy: Arc<dyn UriPolicy>,
    pub running: bool,
    pub disposed: bool,
}

impl FrameRecord {
    pub fn is_live(&self) -> bool {
        self.running && !self.disposed
    }
}

impl std::fmt::Debug for FrameRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRecord")
            .field("container", &self.container)
            .field("running", &self.running)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct EngineState {
    config: Option<EngineConfig>,
    frames: Vec<FrameRecord>,
    fail_next_load: Option<String>,
    fail_next_run: Option<String>,
}

#[derive(Clone, Default)]
pub struct EngineProbe {
    state: Arc<Mutex<EngineState>>,
}

impl EngineProbe {
    pub fn is_initialized(&self) -> bool {
        lock(&self.state).config.is_some()
    }

    /// Configuration the engine was initialized with.
    pub fn config(&self) -> Option<EngineConfig> {
        lock(&self.state).config.clone()
    }

    pub fn frames(&self) -> Vec<FrameRecord> {
        lock(&self.state).frames.clone()
    }

    pub fn live_frames(&self) -> usize {
        lock(&self.state).frames.iter().filter(|f| f.is_live()).count()
    }

    /// Latest frame loaded into `container`.
    pub fn frame_for(&self, container: &ContainerNode) -> Option<FrameRecord> {
        lock(&self.state)
            .frames
            .iter()
            .rev()
            .find(|f| &f.container == container)
            .cloned()
    }

    /// Makes the next `load` fail with `message`.
    pub fn fail_next_load(&self, message: impl Into<String>) {
        lock(&self.state).fail_next_load = Some(message.into());
    }

    /// Makes the next frame's `run` fail with `message`.
    pub fn fail_next_run(&self, message: impl Into<String>) {
        lock(&self.state).fail_next_run = Some(message.into());
    }
}

impl std::fmt::Debug for EngineProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("EngineProbe")
            .field("initialized", &state.config.is_some())
            .field("frames", &state.frames.len())
            .finish()
    }
}

/// Sandbox engine that records frames instead of executing them.
#[derive(Debug, Default)]
pub struct HeadlessEngine {
    probe: EngineProbe,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> EngineProbe {
        self.probe.clone()
    }
}

impl SandboxEngine for HeadlessEngine {
    fn initialize(&mut self, config: &EngineConfig) -> Result<(), SandboxError> {
        if config.policy_server.trim().is_empty() {
            return Err(SandboxError::Initialization("policy server is not set".into()));
        }
        lock(&self.probe.state).config = Some(config.clone());
        debug!(es5_mode = config.es5_mode, "Headless engine initialized");
        Ok(())
    }

    fn load(
        &mut self,
        container: &ContainerNode,
        uri_policy: Arc<dyn UriPolicy>,
    ) -> Result<Box<dyn SandboxFrame>, SandboxError> {
        let mut state = lock(&self.probe.state);
        if state.config.is_none() {
            return Err(SandboxError::NotInitialized);
        }
        if let Some(message) = state.fail_next_load.take() {
            return Err(SandboxError::Load {
                container: container.id().to_string(),
                message,
            });
        }
        state.frames.push(FrameRecord {
            container: container.clone(),
            markup: None,
            library: None,
            uri_policy,
            running: false,
            disposed: false,
        });
        Ok(Box::new(HeadlessFrame {
            probe: self.probe.clone(),
            index: state.frames.len() - 1,
        }))
    }
}

struct HeadlessFrame {
    probe: EngineProbe,
    index: usize,
}

impl HeadlessFrame {
    fn update<R>(&self, f: impl FnOnce(&mut FrameRecord) -> R) -> Option<R> {
        lock(&self.probe.state).frames.get_mut(self.index).map(f)
    }
}

impl SandboxFrame for HeadlessFrame {
    fn code(&mut self, path: &str, content_type: &str, source: &str) -> Result<(), SandboxError> {
        if path != ENTRY_PATH {
            return Err(SandboxError::Execution(format!("unexpected code path '{}'", path)));
        }
        debug!(content_type, bytes = source.len(), "Frame received code");
        self.update(|frame| frame.markup = Some(source.to_string()));
        Ok(())
    }

    fn api(&mut self, library: Arc<CapabilityLibrary>) -> Result<(), SandboxError> {
        self.update(|frame| frame.library = Some(library));
        Ok(())
    }

    fn run(&mut self) -> Result<(), SandboxError> {
        if let Some(message) = lock(&self.probe.state).fail_next_run.take() {
            return Err(SandboxError::Execution(message));
        }
        let ready = self
            .update(|frame| {
                let ready = frame.markup.is_some() && frame.library.is_some();
                frame.running = ready;
                ready
            })
            .unwrap_or(false);
        if ready {
            Ok(())
        } else {
            Err(SandboxError::Execution("frame has no code or api".into()))
        }
    }

    fn dispose(&mut self) {
        self.update(|frame| {
            frame.running = false;
            frame.disposed = true;
        });
    }
}

// ====================================================================
// Viewport
// ====================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ViewportItem {
    pub container: ContainerNode,
    pub fragment: String,
}

#[derive(Debug, Default)]
struct ViewportState {
    mounted: Option<(String, ViewportLayout)>,
    initialized: bool,
    next_id: u64,
    items: Vec<ViewportItem>,
    active: Option<ContainerNode>,
}

#[derive(Debug, Clone, Default)]
pub struct ViewportProbe {
    state: Arc<Mutex<ViewportState>>,
}

impl ViewportProbe {
    pub fn selector(&self) -> Option<String> {
        lock(&self.state).mounted.as_ref().map(|(s, _)| s.clone())
    }

    pub fn layout(&self) -> Option<ViewportLayout> {
        lock(&self.state).mounted.as_ref().map(|(_, l)| l.clone())
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.state).initialized
    }

    /// Items in display order.
    pub fn items(&self) -> Vec<ViewportItem> {
        lock(&self.state).items.clone()
    }

    pub fn item_count(&self) -> usize {
        lock(&self.state).items.len()
    }

    /// Container currently brought to the front.
    pub fn active(&self) -> Option<ContainerNode> {
        lock(&self.state).active.clone()
    }
}

/// Viewport that keeps its item list in memory.
#[derive(Debug, Default)]
pub struct HeadlessViewport {
    probe: ViewportProbe,
}

impl HeadlessViewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> ViewportProbe {
        self.probe.clone()
    }
}

impl Viewport for HeadlessViewport {
    fn mount(&mut self, selector: &str, layout: &ViewportLayout) -> Result<(), ViewportError> {
        lock(&self.probe.state).mounted = Some((selector.to_string(), layout.clone()));
        Ok(())
    }

    fn init(&mut self) -> Result<(), ViewportError> {
        let mut state = lock(&self.probe.state);
        if state.mounted.is_none() {
            return Err(ViewportError::NotMounted);
        }
        state.initialized = true;
        Ok(())
    }

    fn append(
        &mut self,
        fragment: &str,
        container_class: &str,
    ) -> Result<ContainerNode, ViewportError> {
        let mut state = lock(&self.probe.state);
        if !state.initialized {
            return Err(ViewportError::NotMounted);
        }
        if !has_class(fragment, container_class) {
            return Err(ViewportError::ContainerNotFound {
                class: container_class.to_string(),
            });
        }
        state.next_id += 1;
        let container = ContainerNode::new(format!("{}-{}", container_class, state.next_id));
        state.items.push(ViewportItem {
            container: container.clone(),
            fragment: fragment.to_string(),
        });
        Ok(container)
    }

    fn activate(&mut self, container: &ContainerNode) -> Result<(), ViewportError> {
        let mut state = lock(&self.probe.state);
        if !state.items.iter().any(|i| &i.container == container) {
            return Err(ViewportError::UnknownContainer(container.id().to_string()));
        }
        state.active = Some(container.clone());
        Ok(())
    }

    fn remove(&mut self, container: &ContainerNode) -> Result<(), ViewportError> {
        let mut state = lock(&self.probe.state);
        let Some(pos) = state.items.iter().position(|i| &i.container == container) else {
            return Err(ViewportError::UnknownContainer(container.id().to_string()));
        };
        state.items.remove(pos);
        if state.active.as_ref() == Some(container) {
            state.active = None;
        }
        Ok(())
    }
}

/// Whether any `class` attribute in `fragment` lists `class`.
fn has_class(fragment: &str, class: &str) -> bool {
    let mut rest = fragment;
    while let Some(start) = rest.find("class=") {
        rest = &rest[start + "class=".len()..];
        let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        rest = &rest[1..];
        let Some(end) = rest.find(quote) else {
            return false;
        };
        if rest[..end].split_whitespace().any(|c| c == class) {
            return true;
        }
        rest = &rest[end + 1..];
    }
    false
}

// ====================================================================
// Notifier
// ====================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub source: Option<AppId>,
    pub message: String,
}

/// Notifier that keeps every alert and logs it.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        lock(&self.alerts).clone()
    }

    pub fn messages(&self) -> Vec<String> {
        lock(&self.alerts).iter().map(|a| a.message.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, source: Option<&AppId>, message: &str) {
        match source {
            Some(app_id) => info!(app_id = %app_id, "ALERT: {}", message),
            None => info!("ALERT: {}", message),
        }
        lock(&self.alerts).push(Alert {
            source: source.cloned(),
            message: message.to_string(),
        });
    }
}
