//! Application registry: the host's authoritative id → application map.
//!
//! Owns every running `SandboxSession`, the viewport containers they live
//! in, and the active application id. All mutation goes through
//! `add_application`, `activate_application` and `remove_application`
//! (plus `apply_snapshot`, which is built on them), so an id is present if
//! and only if its session is running.

use crate::capability::TierSet;
use crate::engine::ReadyEngine;
use crate::error::HostError;
use crate::library::HostServices;
use crate::session::SandboxSession;
use crate::template::CompiledTemplate;
use crate::uri_policy::UriPolicy;
use crate::viewport::Viewport;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use viewhost_types::{ActiveAppsSnapshot, AppId, ApplicationDescriptor};

/// How an `active_apps` snapshot treats registered applications it does not list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcileMode {
    /// Keep them. Snapshots only ever add.
    #[default]
    Additive,
    /// Remove them.
    Prune,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

/// What applying one snapshot changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    pub added: Vec<AppId>,
    pub already_present: usize,
    pub failed: Vec<AppId>,
    pub removed: Vec<AppId>,
    pub activated: Option<AppId>,
}

/// Registry settings fixed at construction.
pub struct RegistryOptions {
    /// Compiled template wrapping each application in the viewport.
    pub app_template: Box<dyn CompiledTemplate>,
    pub container_class: String,
    pub tiers: TierSet,
    pub uri_policy: Arc<dyn UriPolicy>,
}

struct RegisteredApp {
    descriptor: ApplicationDescriptor,
    session: SandboxSession,
}

pub struct ApplicationRegistry {
    apps: HashMap<AppId, RegisteredApp>,
    active: Option<AppId>,
    engine: ReadyEngine,
    viewport: Box<dyn Viewport>,
    services: HostServices,
    options: RegistryOptions,
}

impl ApplicationRegistry {
    pub fn new(
        engine: ReadyEngine,
        viewport: Box<dyn Viewport>,
        services: HostServices,
        options: RegistryOptions,
    ) -> Self {
        Self {
            apps: HashMap::new(),
            active: None,
            engine,
            viewport,
            services,
            options,
        }
    }

    // ================================================================
    // Lifecycle
    // ================================================================

    /// Renders `descriptor` into the viewport and starts its session.
    ///
    /// Idempotent by id: a descriptor whose id is already registered is
    /// ignored. On failure nothing is left behind, neither a registry entry
    /// nor a viewport container.
    pub fn add_application(
        &mut self,
        descriptor: ApplicationDescriptor,
    ) -> Result<AddOutcome, HostError> {
        if self.apps.contains_key(&descriptor.id) {
            debug!(app_id = %descriptor.id, "Application already registered");
            return Ok(AddOutcome::AlreadyPresent);
        }

        let fragment = self
            .options
            .app_template
            .render(&descriptor.template_params())?;
        let container = self
            .viewport
            .append(fragment.trim(), &self.options.container_class)?;

        let session = match SandboxSession::start(
            &mut self.engine,
            &descriptor,
            container.clone(),
            &self.options.tiers,
            &self.services,
            Arc::clone(&self.options.uri_policy),
        ) {
            Ok(session) => session,
            Err(e) => {
                if let Err(ve) = self.viewport.remove(&container) {
                    warn!(app_id = %descriptor.id, "Failed to roll back container: {}", ve);
                }
                return Err(e.into());
            }
        };

        info!(app_id = %descriptor.id, container = container.id(), "Application added");
        self.apps.insert(
            descriptor.id.clone(),
            RegisteredApp {
                descriptor,
                session,
            },
        );
        Ok(AddOutcome::Added)
    }

    /// Makes `id` the active application. Returns `false`, changing
    /// nothing, when `id` is not registered.
    pub fn activate_application(&mut self, id: &str) -> bool {
        let Some(app) = self.apps.get(id) else {
            debug!(app_id = id, "Cannot activate unknown application");
            return false;
        };
        let app_id = app.descriptor.id.clone();
        if let Err(e) = self.viewport.activate(app.session.container()) {
            warn!(app_id = %app_id, "Viewport failed to bring application to front: {}", e);
        }
        info!(app_id = %app_id, "Application activated");
        self.active = Some(app_id);
        true
    }

    /// Tears down `id`'s session and forgets it. Returns `false` when `id`
    /// is not registered.
    pub fn remove_application(&mut self, id: &str) -> bool {
        if !self.apps.contains_key(id) {
            return false;
        }
        if self.active.as_ref().map(AppId::as_str) == Some(id) {
            self.active = None;
        }

        let Some(app) = self.apps.get_mut(id) else {
            return false;
        };
        app.session.teardown();
        if let Err(e) = self.viewport.remove(app.session.container()) {
            warn!(app_id = id, "Failed to remove container: {}", e);
        }
        self.apps.remove(id);
        info!(app_id = id, "Application removed");
        true
    }

    /// Applies an `active_apps` snapshot: adds every listed application in
    /// order, prunes unlisted ones in `Prune` mode, then activates the
    /// snapshot's active id.
    ///
    /// Pruning is skipped for snapshots that had undecodable entries, since
    /// those entries may name applications that are still live.
    pub fn apply_snapshot(
        &mut self,
        snapshot: &ActiveAppsSnapshot,
        mode: ReconcileMode,
    ) -> SnapshotReport {
        let mut report = SnapshotReport::default();

        for descriptor in &snapshot.apps {
            match self.add_application(descriptor.clone()) {
                Ok(AddOutcome::Added) => report.added.push(descriptor.id.clone()),
                Ok(AddOutcome::AlreadyPresent) => report.already_present += 1,
                Err(e) => {
                    warn!(app_id = %descriptor.id, "Failed to add application: {}", e);
                    report.failed.push(descriptor.id.clone());
                }
            }
        }

        if mode == ReconcileMode::Prune {
            if snapshot.is_complete() {
                let listed: HashSet<&AppId> = snapshot.apps.iter().map(|d| &d.id).collect();
                let stale: Vec<AppId> = self
                    .apps
                    .keys()
                    .filter(|id| !listed.contains(id))
                    .cloned()
                    .collect();
                for id in stale {
                    if self.remove_application(id.as_str()) {
                        report.removed.push(id);
                    }
                }
            } else {
                warn!(
                    skipped = snapshot.skipped.len(),
                    "Snapshot had malformed entries, not pruning"
                );
            }
        }

        if let Some(active) = &snapshot.active_app_id {
            if self.activate_application(active.as_str()) {
                report.activated = Some(active.clone());
            } else {
                warn!(app_id = %active, "Snapshot names an active application that is not registered");
            }
        }

        report
    }

    /// Tears down every session. Used on host shutdown.
    pub fn teardown_all(&mut self) {
        let ids: Vec<AppId> = self.apps.keys().cloned().collect();
        for id in ids {
            self.remove_application(id.as_str());
        }
    }

    // ================================================================
    // Queries
    // ================================================================

    pub fn contains(&self, id: &str) -> bool {
        self.apps.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<AppId> {
        let mut ids: Vec<AppId> = self.apps.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn active(&self) -> Option<&AppId> {
        self.active.as_ref()
    }

    pub fn descriptor(&self, id: &str) -> Option<&ApplicationDescriptor> {
        self.apps.get(id).map(|a| &a.descriptor)
    }

    pub fn session(&self, id: &str) -> Option<&SandboxSession> {
        self.apps.get(id).map(|a| &a.session)
    }

    /// Number of running sessions. Always equal to `len()`.
    pub fn live_sessions(&self) -> usize {
        self.apps.values().filter(|a| a.session.is_running()).count()
    }
}

impl Drop for ApplicationRegistry {
    fn drop(&mut self) {
        self.teardown_all();
    }
}
