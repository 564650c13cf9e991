//! Host startup and the host actor.
//!
//! `HostBootstrap::start` brings the collaborators up in a fixed order:
//! sandbox engine, viewport, registry, control channel. The control
//! channel's listeners only enqueue [`HostCommand`]s. [`Host`] is the one
//! place that drains that queue and mutates the registry.

use crate::config::HostConfig;
use crate::engine::{ReadyEngine, SandboxEngine};
use crate::error::HostError;
use crate::library::HostServices;
use crate::notify::Notifier;
use crate::registry::{ApplicationRegistry, ReconcileMode, RegistryOptions};
use crate::template::TemplateEngine;
use crate::viewport::Viewport;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use viewhost_channel::{Channel, ChannelConfig, ChannelHandle, Endpoint, Transport};
use viewhost_types::message::{ACTIVE_APPS, LAUNCH_APP};
use viewhost_types::{ActiveAppsSnapshot, LaunchRequest};

/// External systems the host drives.
pub struct Collaborators {
    pub engine: Box<dyn SandboxEngine>,
    pub viewport: Box<dyn Viewport>,
    pub templates: Arc<dyn TemplateEngine>,
    pub notifier: Arc<dyn Notifier>,
    pub transport: Arc<dyn Transport>,
}

/// Work item for the host actor.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    /// Raw `active_apps` payload from the control channel.
    SyncActiveApps(Value),
    /// Raw `launch_app` payload from the control channel.
    LaunchApp(Value),
    Shutdown,
}

/// Cloneable sender into a running host.
#[derive(Debug, Clone)]
pub struct HostHandle {
    commands: mpsc::UnboundedSender<HostCommand>,
}

impl HostHandle {
    /// Queues `command`. Returns `false` if the host is gone.
    pub fn send(&self, command: HostCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn shutdown(&self) -> bool {
        self.send(HostCommand::Shutdown)
    }
}

pub struct HostBootstrap;

impl HostBootstrap {
    pub fn start(config: &HostConfig, collaborators: Collaborators) -> Result<Host, HostError> {
        let Collaborators {
            engine,
            mut viewport,
            templates,
            notifier,
            transport,
        } = collaborators;

        // 1. Engine. Nothing else starts if this fails.
        let engine = ReadyEngine::initialize(engine, &config.engine)?;

        // 2. Viewport.
        viewport.mount(&config.viewport.selector, &config.viewport.layout)?;
        viewport.init()?;
        info!(selector = %config.viewport.selector, "Viewport mounted");

        // 3. Registry, then the control channel feeding it.
        let app_template = templates.compile(&config.viewport.app_template)?;
        let services = HostServices {
            templates,
            notifier: Arc::clone(&notifier),
            transport: Arc::clone(&transport),
            endpoint_base: config.control.endpoint.clone(),
        };
        let options = RegistryOptions {
            app_template,
            container_class: config.viewport.container_class.clone(),
            tiers: config.capabilities.tiers.clone(),
            uri_policy: config.uri_policy.build(),
        };
        let registry = ApplicationRegistry::new(engine, viewport, services, options);

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let control_config = ChannelConfig::new(config.control.init_msg.clone())
            .listener(ACTIVE_APPS, forward(commands_tx.clone(), HostCommand::SyncActiveApps))
            .listener(LAUNCH_APP, forward(commands_tx.clone(), HostCommand::LaunchApp));
        let endpoint = Endpoint::new(
            config.control.endpoint.clone(),
            config.control.namespace.clone(),
        );
        info!(endpoint = %endpoint, "Opening control channel");
        let control = Channel::open(transport.as_ref(), endpoint, control_config)?;

        info!(
            tiers = ?config.capabilities.tiers,
            reconcile = ?config.sync.reconcile,
            "Host started"
        );
        Ok(Host {
            registry,
            notifier,
            reconcile: config.sync.reconcile,
            control_handle: control.handle(),
            control: Some(control),
            control_task: None,
            commands_tx,
            commands_rx,
            stopped: false,
        })
    }
}

fn forward(
    commands: mpsc::UnboundedSender<HostCommand>,
    wrap: fn(Value) -> HostCommand,
) -> impl FnMut(&Value) + Send + 'static {
    move |payload: &Value| {
        if commands.send(wrap(payload.clone())).is_err() {
            debug!("Host gone, dropping control message");
        }
    }
}

/// The running host.
pub struct Host {
    registry: ApplicationRegistry,
    notifier: Arc<dyn Notifier>,
    reconcile: ReconcileMode,
    control: Option<Channel>,
    control_handle: ChannelHandle,
    control_task: Option<JoinHandle<()>>,
    commands_tx: mpsc::UnboundedSender<HostCommand>,
    commands_rx: mpsc::UnboundedReceiver<HostCommand>,
    stopped: bool,
}

impl Host {
    /// Sender for queuing commands from other tasks.
    pub fn sender(&self) -> HostHandle {
        HostHandle {
            commands: self.commands_tx.clone(),
        }
    }

    pub fn registry(&self) -> &ApplicationRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ApplicationRegistry {
        &mut self.registry
    }

    pub fn control(&self) -> &ChannelHandle {
        &self.control_handle
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Processes one command. Returns `false` once the host has stopped.
    pub fn handle(&mut self, command: HostCommand) -> bool {
        if self.stopped {
            debug!(?command, "Host stopped, ignoring command");
            return false;
        }
        match command {
            HostCommand::SyncActiveApps(payload) => self.sync_active_apps(&payload),
            HostCommand::LaunchApp(payload) => {
                let request = LaunchRequest::parse(&payload);
                info!(app_id = ?request.app_id, "Launch requested");
                self.notifier.alert(None, &request.notice());
            }
            HostCommand::Shutdown => self.shutdown(),
        }
        !self.stopped
    }

    fn sync_active_apps(&mut self, payload: &Value) {
        let snapshot = match ActiveAppsSnapshot::parse(payload) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Rejected active_apps payload: {}", e);
                return;
            }
        };
        for skipped in &snapshot.skipped {
            warn!(index = skipped.index, "Skipped malformed application: {}", skipped.reason);
        }

        let report = self.registry.apply_snapshot(&snapshot, self.reconcile);
        info!(
            added = report.added.len(),
            present = report.already_present,
            failed = report.failed.len(),
            removed = report.removed.len(),
            active = ?report.activated,
            "Applied active_apps snapshot"
        );
    }

    /// Pumps the control channel and handles every queued command without
    /// waiting. Returns the number of commands handled.
    pub fn poll_pending(&mut self) -> usize {
        if let Some(control) = self.control.as_mut() {
            control.poll_pending();
        }
        let mut handled = 0;
        while let Ok(command) = self.commands_rx.try_recv() {
            handled += 1;
            if !self.handle(command) {
                break;
            }
        }
        handled
    }

    /// Runs until a `Shutdown` command arrives, then tears everything down.
    pub async fn run(&mut self) {
        if let Some(control) = self.control.take() {
            self.control_task = Some(tokio::spawn(control.run()));
        }
        while !self.stopped {
            match self.commands_rx.recv().await {
                Some(command) => {
                    self.handle(command);
                }
                None => break,
            }
        }
        self.shutdown();
    }

    /// Closes the control channel and tears down every session. Idempotent.
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.control_handle.close();
        self.control_task.take();
        let sessions = self.registry.len();
        self.registry.teardown_all();
        info!(sessions, "Host shut down");
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.shutdown();
    }
}
