//! Control-channel message names and payloads.
//!
//! The backend pushes `active_apps` snapshots and `launch_app` notices;
//! the host announces itself with `get_active_apps` on every connect.

use crate::descriptor::ApplicationDescriptor;
use crate::ids::AppId;
use serde_json::{Map, Value};

/// Inbound: full snapshot of the applications the backend considers live.
pub const ACTIVE_APPS: &str = "active_apps";

/// Inbound: deferred launch notice.
pub const LAUNCH_APP: &str = "launch_app";

/// Outbound: handshake asking the backend to push an `active_apps` snapshot.
pub const GET_ACTIVE_APPS: &str = "get_active_apps";

/// Handshake sent by channels that do not name their own.
pub const DEFAULT_INIT_MSG: &str = "first-dummy-message";

/// An `apps` entry that could not be decoded into a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Position of the entry in the `apps` array.
    pub index: usize,
    pub reason: String,
}

/// Decoded `active_apps` payload.
///
/// Decoding is best-effort inside a well-formed envelope: entries that do
/// not decode are collected in `skipped` and the rest are kept in order.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveAppsSnapshot {
    pub apps: Vec<ApplicationDescriptor>,
    pub active_app_id: Option<AppId>,
    pub skipped: Vec<SkippedEntry>,
}

impl ActiveAppsSnapshot {
    /// Decodes a raw payload.
    ///
    /// Fails only when the envelope itself is unusable: the payload is not
    /// an object or it has no `apps` array. A missing, null or non-string
    /// `activeAppId` decodes to `None`.
    pub fn parse(payload: &Value) -> crate::Result<Self> {
        let obj = payload
            .as_object()
            .ok_or_else(|| crate::Error::MalformedPayload("payload is not an object".into()))?;

        let entries = obj
            .get("apps")
            .and_then(Value::as_array)
            .ok_or_else(|| crate::Error::MalformedPayload("missing `apps` array".into()))?;

        let mut apps = Vec::with_capacity(entries.len());
        let mut skipped = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            match ApplicationDescriptor::from_value(entry.clone()) {
                Ok(descriptor) => apps.push(descriptor),
                Err(e) => skipped.push(SkippedEntry {
                    index,
                    reason: e.to_string(),
                }),
            }
        }

        let active_app_id = obj
            .get("activeAppId")
            .and_then(Value::as_str)
            .and_then(|s| AppId::new(s).ok());

        Ok(Self {
            apps,
            active_app_id,
            skipped,
        })
    }

    /// Whether every entry of the payload decoded.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Decoded `launch_app` payload. Only the target id is interpreted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaunchRequest {
    pub app_id: Option<AppId>,
    pub extra: Map<String, Value>,
}

impl LaunchRequest {
    /// Decodes a raw payload. Never fails: unknown shapes yield an empty request.
    pub fn parse(payload: &Value) -> Self {
        let Some(obj) = payload.as_object() else {
            return Self::default();
        };
        let app_id = ["appId", "id"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .and_then(|s| AppId::new(s).ok());
        let extra = obj
            .iter()
            .filter(|(k, _)| k.as_str() != "appId" && k.as_str() != "id")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self { app_id, extra }
    }

    /// Human-readable notice shown to the user.
    pub fn notice(&self) -> String {
        match &self.app_id {
            Some(id) => format!("launching app {id}."),
            None => "launching app.".to_string(),
        }
    }
}
