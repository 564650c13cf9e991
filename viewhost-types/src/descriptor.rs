//! Application descriptors as reported by the backend.

use crate::ids::AppId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata describing one hosted application.
///
/// `markup` is the HTML-like source executed inside the application's
/// sandbox. Every field the host does not interpret is kept in `display`
/// and only ever reaches the rendering templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDescriptor {
    pub id: AppId,
    #[serde(rename = "html", alias = "markup")]
    pub markup: String,
    /// Namespace of the application's own backend channel, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub display: Map<String, Value>,
}

impl ApplicationDescriptor {
    /// Creates a descriptor with no namespace and no display metadata.
    pub fn new(id: AppId, markup: impl Into<String>) -> Self {
        Self {
            id,
            markup: markup.into(),
            namespace: None,
            display: Map::new(),
        }
    }

    /// Sets the per-application channel namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Adds one display metadata field.
    #[must_use]
    pub fn with_display(mut self, key: impl Into<String>, value: Value) -> Self {
        self.display.insert(key.into(), value);
        self
    }

    /// Decodes a descriptor from a JSON value.
    pub fn from_value(value: Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Returns the parameters handed to rendering templates: the
    /// descriptor's own fields with display metadata flattened in.
    pub fn template_params(&self) -> Value {
        let mut params = self.display.clone();
        params.insert("id".into(), Value::String(self.id.to_string()));
        params.insert("html".into(), Value::String(self.markup.clone()));
        if let Some(ns) = &self.namespace {
            params.insert("namespace".into(), Value::String(ns.clone()));
        }
        Value::Object(params)
    }
}
