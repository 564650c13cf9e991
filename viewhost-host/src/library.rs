//! Per-application capability library.
//!
//! A library is built once per session from the host's enabled tiers. Its
//! key set comes from the static allow-list in [`crate::capability`], never
//! from anything the application supplies, and it has no mutation API.
//!
//! Every entry is a [`TamedCapability`]: sandboxed code can invoke it but
//! cannot see or replace its implementation, and a failing call never
//! propagates back across the boundary.

use crate::capability::{Capability, TierSet};
use crate::error::CapabilityError;
use crate::notify::Notifier;
use crate::template::TemplateEngine;
use crate::value::SandboxValue;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use viewhost_channel::{Channel, ChannelConfig, ChannelHandle, Endpoint, Transport};
use viewhost_types::message::DEFAULT_INIT_MSG;
use viewhost_types::{AppId, ApplicationDescriptor};

type CapabilityFn =
    Arc<dyn Fn(&[SandboxValue]) -> Result<SandboxValue, CapabilityError> + Send + Sync>;

/// Host collaborators capabilities are allowed to reach.
#[derive(Clone)]
pub struct HostServices {
    pub templates: Arc<dyn TemplateEngine>,
    pub notifier: Arc<dyn Notifier>,
    pub transport: Arc<dyn Transport>,
    /// Server base address for per-application channels.
    pub endpoint_base: String,
}

impl fmt::Debug for HostServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostServices")
            .field("endpoint_base", &self.endpoint_base)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct ScopeState {
    channels: Vec<ChannelHandle>,
    closed: bool,
}

/// Resources a session owns on behalf of its application, released on teardown.
#[derive(Debug, Clone, Default)]
pub struct SessionScope {
    state: Arc<Mutex<ScopeState>>,
}

impl SessionScope {
    fn state(&self) -> MutexGuard<'_, ScopeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tracks a channel opened for the application. A channel registered
    /// after the scope closed is closed immediately.
    pub fn register_channel(&self, handle: ChannelHandle) {
        let mut state = self.state();
        if state.closed {
            drop(state);
            handle.close();
            return;
        }
        state.channels.push(handle);
    }

    pub fn channel_count(&self) -> usize {
        self.state().channels.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Closes every tracked channel.
    pub fn close(&self) {
        let drained: Vec<ChannelHandle> = {
            let mut state = self.state();
            state.closed = true;
            state.channels.drain(..).collect()
        };
        for handle in drained {
            handle.close();
        }
    }
}

/// What a library is built for.
#[derive(Debug, Clone)]
pub struct AppContext<'a> {
    pub descriptor: &'a ApplicationDescriptor,
    pub scope: SessionScope,
}

/// A host function exposed to sandboxed code.
pub struct TamedCapability {
    capability: Capability,
    app_id: AppId,
    func: CapabilityFn,
}

impl TamedCapability {
    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn name(&self) -> &'static str {
        self.capability.name()
    }

    /// Calls the capability. Errors and panics are logged and turned into
    /// `SandboxValue::Null`; host state is left as it was before the call.
    pub fn invoke(&self, args: &[SandboxValue]) -> SandboxValue {
        match catch_unwind(AssertUnwindSafe(|| (self.func)(args))) {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!(app_id = %self.app_id, capability = self.name(), "Capability call had no effect: {}", e);
                SandboxValue::Null
            }
            Err(_) => {
                warn!(app_id = %self.app_id, capability = self.name(), "Capability panicked; call had no effect");
                SandboxValue::Null
            }
        }
    }
}

impl fmt::Debug for TamedCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TamedCapability({})", self.name())
    }
}

/// Immutable name → capability mapping for one application.
pub struct CapabilityLibrary {
    app_id: AppId,
    entries: BTreeMap<&'static str, TamedCapability>,
}

impl CapabilityLibrary {
    /// Builds the library for `ctx` from the capabilities `tiers` allow.
    pub fn build(ctx: &AppContext<'_>, tiers: &TierSet, services: &HostServices) -> Self {
        let allowed = tiers.allowed();
        let names: Vec<&'static str> = allowed.iter().map(Capability::name).collect();
        let app_id = ctx.descriptor.id.clone();

        let entries = allowed
            .iter()
            .map(|&capability| {
                let tamed = TamedCapability {
                    capability,
                    app_id: app_id.clone(),
                    func: bind(capability, ctx, services, &names),
                };
                (capability.name(), tamed)
            })
            .collect();

        debug!(app_id = %app_id, capabilities = ?names, "Capability library built");
        Self { app_id, entries }
    }

    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    pub fn get(&self, name: &str) -> Option<&TamedCapability> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Exposed names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Invokes `name`. An unknown name is a no-op returning null.
    pub fn invoke(&self, name: &str, args: &[SandboxValue]) -> SandboxValue {
        match self.entries.get(name) {
            Some(capability) => capability.invoke(args),
            None => {
                warn!(app_id = %self.app_id, capability = name, "Call to capability outside the allow-list");
                SandboxValue::Null
            }
        }
    }
}

impl fmt::Debug for CapabilityLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityLibrary")
            .field("app_id", &self.app_id)
            .field("capabilities", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn bind(
    capability: Capability,
    ctx: &AppContext<'_>,
    services: &HostServices,
    names: &[&'static str],
) -> CapabilityFn {
    let app_id = ctx.descriptor.id.clone();
    match capability {
        Capability::Template => {
            let templates = Arc::clone(&services.templates);
            capability_fn(move |args| render_template(templates.as_ref(), args))
        }
        Capability::Socket => {
            let opener = SocketOpener {
                app_id,
                transport: Arc::clone(&services.transport),
                base: services.endpoint_base.clone(),
                namespace: ctx.descriptor.namespace.clone(),
                scope: ctx.scope.clone(),
            };
            capability_fn(move |args| opener.open(args))
        }
        Capability::Alert => {
            let notifier = Arc::clone(&services.notifier);
            capability_fn(move |args| {
                let message = args
                    .first()
                    .map(SandboxValue::to_display_string)
                    .unwrap_or_default();
                notifier.alert(Some(&app_id), &message);
                Ok(SandboxValue::Null)
            })
        }
        Capability::Log => capability_fn(move |args| {
            let line = args
                .iter()
                .map(SandboxValue::to_display_string)
                .collect::<Vec<_>>()
                .join(" ");
            info!(target: "viewhost::app", app_id = %app_id, "{}", line);
            Ok(SandboxValue::Null)
        }),
        Capability::Describe => {
            let description = json!({ "id": app_id.as_str(), "capabilities": names });
            capability_fn(move |_| Ok(SandboxValue::Data(description.clone())))
        }
    }
}

fn capability_fn<F>(f: F) -> CapabilityFn
where
    F: Fn(&[SandboxValue]) -> Result<SandboxValue, CapabilityError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn render_template(
    templates: &dyn TemplateEngine,
    args: &[SandboxValue],
) -> Result<SandboxValue, CapabilityError> {
    let source = args
        .first()
        .and_then(SandboxValue::as_str)
        .ok_or_else(|| CapabilityError::InvalidArgument("template source must be a string".into()))?;
    let params = args
        .get(1)
        .map(SandboxValue::to_json)
        .unwrap_or_else(|| Value::Object(Map::new()));
    let rendered = templates.compile(source)?.render(&params)?;
    Ok(SandboxValue::Data(Value::String(rendered)))
}

/// Opens channels scoped to one application's namespace.
struct SocketOpener {
    app_id: AppId,
    transport: Arc<dyn Transport>,
    base: String,
    namespace: Option<String>,
    scope: SessionScope,
}

impl SocketOpener {
    fn open(&self, args: &[SandboxValue]) -> Result<SandboxValue, CapabilityError> {
        let namespace = self.namespace.as_deref().ok_or_else(|| {
            CapabilityError::Unavailable("application has no channel namespace".into())
        })?;
        if self.scope.is_closed() {
            return Err(CapabilityError::Unavailable("session is torn down".into()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| CapabilityError::Unavailable("no async runtime for channels".into()))?;

        let params = args.first().cloned().unwrap_or_default();
        let init_msg = params
            .field("initMsg")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_INIT_MSG.to_string());

        let mut config = ChannelConfig::new(init_msg);
        if let Some(listeners) = params.field("listeners") {
            for (name, value) in listeners.entries() {
                match value {
                    SandboxValue::Function(f) => {
                        config = config.listener(name, move |payload| f.call(payload));
                    }
                    _ => debug!(app_id = %self.app_id, listener = %name, "Skipping non-function listener"),
                }
            }
        }

        let endpoint = Endpoint::new(self.base.clone(), namespace);
        info!(app_id = %self.app_id, endpoint = %endpoint, "Opening application channel");
        let channel = Channel::open(self.transport.as_ref(), endpoint, config)?;
        let handle = channel.handle();
        runtime.spawn(channel.run());
        self.scope.register_channel(handle.clone());
        Ok(SandboxValue::Channel(handle))
    }
}
