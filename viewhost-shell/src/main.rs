//! viewhost shell
//!
//! Runs the application host headlessly: connects the control channel to
//! a backend over WebSocket, keeps the registry in sync with the backend's
//! `active_apps` snapshots and logs what the sandboxed applications do.
//!
//! Usage:
//!   viewhost-shell --config viewhost.toml
//!   viewhost-shell --endpoint ws://127.0.0.1:5000 --verbose

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use viewhost_channel::WebSocketTransport;
use viewhost_host::headless::{HeadlessEngine, HeadlessViewport};
use viewhost_host::{Collaborators, HostBootstrap, HostConfig, LogNotifier, TeraTemplates};

#[derive(Parser, Debug)]
#[command(name = "viewhost-shell")]
#[command(about = "Sandboxed application host for the viewhost backend")]
struct Args {
    /// Path to the host configuration file
    #[arg(short, long, default_value = "viewhost.toml")]
    config: PathBuf,

    /// Backend address, overriding `control.endpoint` from the config
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    info!("viewhost shell starting...");
    let mut config = HostConfig::load_from(&args.config);
    if let Some(endpoint) = args.endpoint {
        config.control.endpoint = endpoint;
    }
    info!(endpoint = %config.control.endpoint, "Backend endpoint");

    let transport = WebSocketTransport::new(config.control.reconnect.policy());
    let collaborators = Collaborators {
        engine: Box::new(HeadlessEngine::new()),
        viewport: Box::new(HeadlessViewport::new()),
        templates: Arc::new(TeraTemplates),
        notifier: Arc::new(LogNotifier),
        transport: Arc::new(transport),
    };
    let mut host =
        HostBootstrap::start(&config, collaborators).context("Failed to start application host")?;

    let sender = host.sender();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for interrupt: {}", e);
            return;
        }
        info!("Interrupt received, shutting down");
        sender.shutdown();
    });

    host.run().await;
    info!("viewhost shell stopped");
    Ok(())
}
