//! Host configuration, read from a TOML file.
//!
//! ```toml
//! [engine]
//! es5-mode = true
//! policy-server = "https://caja.appspot.com/"
//! debug = false
//!
//! [viewport]
//! selector = "#oneperframe"
//!
//! [control]
//! endpoint = "ws://127.0.0.1:5000"
//! namespace = "/shell"
//!
//! [capabilities]
//! tiers = ["basic"]
//!
//! [uri-policy]
//! mode = "allowlist"
//! prefixes = ["https://cdn.example.com/"]
//!
//! [sync]
//! reconcile = "additive"
//! ```
//!
//! Every key is optional. A missing or unparseable file falls back to the
//! defaults, which deny all resource URIs.

use crate::capability::TierSet;
use crate::engine::EngineConfig;
use crate::error::HostError;
use crate::registry::ReconcileMode;
use crate::uri_policy::UriPolicyConfig;
use crate::viewport::ViewportLayout;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use viewhost_channel::ReconnectPolicy;
use viewhost_types::message::GET_ACTIVE_APPS;

/// Template wrapping each application in the viewport's item list.
pub const DEFAULT_APP_TEMPLATE: &str =
    r#"<li class="application"><div class="application-wrap" data-app-id="{{ id }}"></div></li>"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ViewportConfig {
    /// Selector of the element the carousel is bound to.
    pub selector: String,
    /// Class marking the per-application container inside `app-template`.
    pub container_class: String,
    pub app_template: String,
    pub layout: ViewportLayout,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            selector: "#oneperframe".to_string(),
            container_class: "application-wrap".to_string(),
            app_template: DEFAULT_APP_TEMPLATE.to_string(),
            layout: ViewportLayout::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            factor: policy.factor,
        }
    }
}

impl ReconnectConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            factor: self.factor,
        }
    }
}

/// Control channel to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ControlConfig {
    /// Server base address, shared by per-application channels.
    pub endpoint: String,
    pub namespace: String,
    /// Handshake asking the backend for a snapshot.
    pub init_msg: String,
    pub reconnect: ReconnectConfig,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:5000".to_string(),
            namespace: "/shell".to_string(),
            init_msg: GET_ACTIVE_APPS.to_string(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CapabilityConfig {
    pub tiers: TierSet,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SyncConfig {
    pub reconcile: ReconcileMode,
}

/// Complete host configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HostConfig {
    pub engine: EngineConfig,
    pub viewport: ViewportConfig,
    pub control: ControlConfig,
    pub capabilities: CapabilityConfig,
    pub uri_policy: UriPolicyConfig,
    pub sync: SyncConfig,
}

impl HostConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, HostError> {
        toml::from_str(contents).map_err(|e| HostError::Config(e.to_string()))
    }

    /// Loads configuration from `path`.
    /// Falls back to defaults with a warning when the file is missing or invalid.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!("No host config found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    info!("Loaded host config from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!(
                        "Failed to parse host config {:?}: {}. Falling back to defaults.",
                        path, e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read host config {:?}: {}", path, e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityTier;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = HostConfig::default();
        assert!(config.engine.es5_mode);
        assert_eq!(config.engine.policy_server, "https://caja.appspot.com/");
        assert_eq!(config.viewport.selector, "#oneperframe");
        assert_eq!(config.control.namespace, "/shell");
        assert_eq!(config.control.init_msg, "get_active_apps");
        assert_eq!(config.capabilities.tiers, TierSet::baseline());
        assert_eq!(config.uri_policy, UriPolicyConfig::DenyAll);
        assert_eq!(config.sync.reconcile, ReconcileMode::Additive);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(HostConfig::from_toml_str("").unwrap(), HostConfig::default());
    }

    #[test]
    fn parses_full_document() {
        let config = HostConfig::from_toml_str(
            r##"
            [engine]
            es5-mode = false
            debug = true

            [viewport]
            selector = "#apps"

            [viewport.layout]
            speed-ms = 150
            item-nav = "centered"

            [control]
            endpoint = "wss://backend.example"
            namespace = "/ctl"

            [control.reconnect]
            initial-delay-ms = 100

            [capabilities]
            tiers = ["basic", "introspection"]

            [uri-policy]
            mode = "allowlist"
            prefixes = ["https://cdn.example.com/"]

            [sync]
            reconcile = "prune"
            "##,
        )
        .unwrap();

        assert!(!config.engine.es5_mode);
        assert!(config.engine.debug);
        assert_eq!(config.viewport.selector, "#apps");
        assert_eq!(config.viewport.layout.speed_ms, 150);
        assert_eq!(config.viewport.layout.item_nav, crate::viewport::ItemNav::Centered);
        assert!(config.viewport.layout.touch_dragging);
        assert_eq!(config.control.endpoint, "wss://backend.example");
        assert_eq!(config.control.namespace, "/ctl");
        assert_eq!(config.control.reconnect.initial_delay_ms, 100);
        assert_eq!(config.control.reconnect.factor, 2);
        assert!(config.capabilities.tiers.is_enabled(CapabilityTier::Introspection));
        assert_eq!(
            config.uri_policy,
            UriPolicyConfig::Allowlist {
                prefixes: vec!["https://cdn.example.com/".into()]
            }
        );
        assert_eq!(config.sync.reconcile, ReconcileMode::Prune);
    }

    #[test]
    fn pass_through_uri_policy() {
        let config = HostConfig::from_toml_str("[uri-policy]\nmode = \"pass-through\"\n").unwrap();
        assert_eq!(config.uri_policy, UriPolicyConfig::PassThrough);
    }

    #[test]
    fn unknown_tier_is_an_error() {
        assert!(HostConfig::from_toml_str("[capabilities]\ntiers = [\"root\"]\n").is_err());
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HostConfig::load_from(&dir.path().join("absent.toml"));
        assert_eq!(config, HostConfig::default());
    }

    #[test]
    fn load_invalid_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is [ not toml").unwrap();
        assert_eq!(HostConfig::load_from(file.path()), HostConfig::default());
    }

    #[test]
    fn load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[control]\nnamespace = \"/other\"").unwrap();
        assert_eq!(HostConfig::load_from(file.path()).control.namespace, "/other");
    }

    #[test]
    fn reconnect_policy_from_config() {
        let policy = ReconnectConfig {
            initial_delay_ms: 10,
            max_delay_ms: 40,
            factor: 3,
        }
        .policy();
        assert_eq!(policy.initial_delay, Duration::from_millis(10));
        assert_eq!(policy.max_delay, Duration::from_millis(40));
        assert_eq!(policy.factor, 3);
    }
}
