//! End-to-end tests for host startup and the control channel, using the
//! mock transport and headless collaborators.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use viewhost_channel::mock::{MockRemote, MockTransport};
use viewhost_host::headless::{
    EngineProbe, HeadlessEngine, HeadlessViewport, RecordingNotifier, ViewportProbe,
};
use viewhost_host::*;
use viewhost_types::AppId;

struct Running {
    host: Host,
    transport: MockTransport,
    engine: EngineProbe,
    viewport: ViewportProbe,
    notifier: RecordingNotifier,
}

impl Running {
    fn control(&self) -> Arc<MockRemote> {
        self.transport.remote_for("/shell").unwrap()
    }
}

fn collaborators() -> (
    Collaborators,
    MockTransport,
    EngineProbe,
    ViewportProbe,
    RecordingNotifier,
) {
    let engine = HeadlessEngine::new();
    let viewport = HeadlessViewport::new();
    let transport = MockTransport::new();
    let notifier = RecordingNotifier::new();
    let (engine_probe, viewport_probe) = (engine.probe(), viewport.probe());
    let collaborators = Collaborators {
        engine: Box::new(engine),
        viewport: Box::new(viewport),
        templates: Arc::new(TeraTemplates),
        notifier: Arc::new(notifier.clone()),
        transport: Arc::new(transport.clone()),
    };
    (collaborators, transport, engine_probe, viewport_probe, notifier)
}

fn start(config: &HostConfig) -> Running {
    let (collaborators, transport, engine, viewport, notifier) = collaborators();
    let host = HostBootstrap::start(config, collaborators).unwrap();
    Running {
        host,
        transport,
        engine,
        viewport,
        notifier,
    }
}

fn one_app() -> serde_json::Value {
    json!({"apps": [{"id": "a1", "html": "<p>a1</p>"}], "activeAppId": "a1"})
}

// ================================================================
// Startup
// ================================================================

#[test]
fn start_initializes_engine_then_viewport_then_control() {
    let r = start(&HostConfig::default());

    assert_eq!(r.engine.config(), Some(EngineConfig::default()));
    assert_eq!(r.viewport.selector().as_deref(), Some("#oneperframe"));
    assert_eq!(r.viewport.layout(), Some(ViewportLayout::default()));
    assert!(r.viewport.is_initialized());

    let control = r.control();
    assert_eq!(control.endpoint().base(), "ws://127.0.0.1:5000");
    assert_eq!(r.host.control().endpoint().namespace(), "/shell");
}

#[test]
fn engine_failure_aborts_startup() {
    let mut config = HostConfig::default();
    config.engine.policy_server = String::new();
    let (collaborators, transport, _engine, viewport, _notifier) = collaborators();

    let result = HostBootstrap::start(&config, collaborators);

    assert!(matches!(
        result,
        Err(HostError::Sandbox(SandboxError::Initialization(_)))
    ));
    assert_eq!(viewport.selector(), None);
    assert!(transport.remotes().is_empty());
}

#[test]
fn bad_app_template_aborts_startup() {
    let mut config = HostConfig::default();
    config.viewport.app_template = "{% if %}".into();
    let (collaborators, transport, _engine, _viewport, _notifier) = collaborators();

    let result = HostBootstrap::start(&config, collaborators);

    assert!(matches!(result, Err(HostError::Template(_))));
    assert!(transport.remotes().is_empty());
}

// ================================================================
// Control channel
// ================================================================

#[test]
fn handshake_asks_for_active_apps() {
    let mut r = start(&HostConfig::default());

    r.control().connect();
    r.host.poll_pending();

    let sent = r.control().take_outbound();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event, "get_active_apps");
    assert_eq!(sent[0].data, json!({}));
}

#[test]
fn active_apps_populates_registry() {
    let mut r = start(&HostConfig::default());
    let control = r.control();

    control.connect();
    control.push("active_apps", one_app());
    r.host.poll_pending();

    assert_eq!(r.host.registry().ids(), vec![AppId::new("a1").unwrap()]);
    assert_eq!(r.host.registry().active().map(AppId::as_str), Some("a1"));
    assert_eq!(r.engine.live_frames(), 1);
    assert_eq!(r.viewport.item_count(), 1);
}

#[test]
fn reconnect_resync_keeps_single_session() {
    let mut r = start(&HostConfig::default());
    let control = r.control();

    control.connect();
    control.push("active_apps", one_app());
    r.host.poll_pending();

    control.disconnect();
    control.connect();
    control.push("active_apps", one_app());
    r.host.poll_pending();

    assert_eq!(r.host.registry().len(), 1);
    assert_eq!(r.engine.frames().len(), 1);
    assert_eq!(r.engine.live_frames(), 1);

    let handshakes = control
        .take_outbound()
        .into_iter()
        .filter(|e| e.event == "get_active_apps")
        .count();
    assert_eq!(handshakes, 2);
}

#[test]
fn launch_app_raises_notice_without_touching_registry() {
    let mut r = start(&HostConfig::default());
    let control = r.control();

    control.push("launch_app", json!({"appId": "a9", "args": [1]}));
    control.push("launch_app", json!("???"));
    r.host.poll_pending();

    assert_eq!(
        r.notifier.messages(),
        vec!["launching app a9.".to_string(), "launching app.".to_string()]
    );
    assert!(r.notifier.alerts().iter().all(|a| a.source.is_none()));
    assert!(r.host.registry().is_empty());
}

#[test]
fn malformed_envelope_is_rejected_whole() {
    let mut r = start(&HostConfig::default());
    let control = r.control();

    control.push("active_apps", json!("garbage"));
    control.push("active_apps", json!({"activeAppId": "a1"}));
    control.push("active_apps", one_app());
    r.host.poll_pending();

    assert_eq!(r.host.registry().len(), 1);
    assert!(!r.host.is_stopped());
}

#[test]
fn prune_mode_from_config() {
    let mut config = HostConfig::default();
    config.sync.reconcile = ReconcileMode::Prune;
    let mut r = start(&config);
    let control = r.control();

    control.push("active_apps", one_app());
    control.push(
        "active_apps",
        json!({"apps": [{"id": "a2", "html": ""}], "activeAppId": "a2"}),
    );
    r.host.poll_pending();

    assert_eq!(r.host.registry().ids(), vec![AppId::new("a2").unwrap()]);
    assert_eq!(r.engine.live_frames(), 1);
}

// ================================================================
// Shutdown
// ================================================================

#[test]
fn shutdown_command_tears_everything_down() {
    let mut r = start(&HostConfig::default());
    r.control().push("active_apps", one_app());
    r.host.poll_pending();

    assert!(!r.host.handle(HostCommand::Shutdown));

    assert!(r.host.is_stopped());
    assert!(r.host.control().is_closed());
    assert!(r.host.registry().is_empty());
    assert_eq!(r.engine.live_frames(), 0);
    assert_eq!(r.viewport.item_count(), 0);

    // Later commands are ignored.
    assert!(!r.host.handle(HostCommand::SyncActiveApps(one_app())));
    assert!(r.host.registry().is_empty());
}

#[tokio::test]
async fn run_applies_commands_until_shutdown() {
    let mut r = start(&HostConfig::default());
    let control = r.control();
    let sender = r.host.sender();

    let driver = async {
        control.connect();
        control.push("active_apps", one_app());
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        sender.shutdown();
    };
    tokio::join!(r.host.run(), driver);

    assert!(r.host.is_stopped());
    let frames = r.engine.frames();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].disposed);
    assert_eq!(control.take_outbound()[0].event, "get_active_apps");
}
