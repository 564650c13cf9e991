//! Values crossing the sandbox boundary.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use viewhost_channel::ChannelHandle;

/// A callback living on the sandboxed side, handed to the host as an argument.
#[derive(Clone)]
pub struct GuestFunction(Arc<dyn Fn(&Value) + Send + Sync>);

impl GuestFunction {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, payload: &Value) {
        (self.0)(payload)
    }
}

impl fmt::Debug for GuestFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GuestFunction")
    }
}

/// Argument or result of a capability call.
#[derive(Debug, Clone, Default)]
pub enum SandboxValue {
    #[default]
    Null,
    Data(Value),
    Function(GuestFunction),
    Record(BTreeMap<String, SandboxValue>),
    /// A host-owned channel the sandbox may send on.
    Channel(ChannelHandle),
}

impl SandboxValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Data(Value::Null))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Data(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&GuestFunction> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_channel(&self) -> Option<&ChannelHandle> {
        match self {
            Self::Channel(c) => Some(c),
            _ => None,
        }
    }

    /// Looks up a field of a record or of a JSON object.
    pub fn field(&self, key: &str) -> Option<SandboxValue> {
        match self {
            Self::Record(fields) => fields.get(key).cloned(),
            Self::Data(Value::Object(obj)) => obj.get(key).cloned().map(Self::Data),
            _ => None,
        }
    }

    /// Iterates the entries of a record or JSON object.
    pub fn entries(&self) -> Vec<(String, SandboxValue)> {
        match self {
            Self::Record(fields) => fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Self::Data(Value::Object(obj)) => obj
                .iter()
                .map(|(k, v)| (k.clone(), Self::Data(v.clone())))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Plain-data view. Functions and channels have no data form and become null.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null | Self::Function(_) | Self::Channel(_) => Value::Null,
            Self::Data(v) => v.clone(),
            Self::Record(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
        }
    }

    /// Text form used by logging and alerts: strings verbatim, anything else as JSON.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Data(Value::String(s)) => s.clone(),
            other => other.to_json().to_string(),
        }
    }
}

impl From<Value> for SandboxValue {
    fn from(value: Value) -> Self {
        Self::Data(value)
    }
}

impl From<&str> for SandboxValue {
    fn from(value: &str) -> Self {
        Self::Data(Value::String(value.to_string()))
    }
}

impl From<GuestFunction> for SandboxValue {
    fn from(value: GuestFunction) -> Self {
        Self::Function(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_reads_records_and_objects() {
        let data = SandboxValue::from(json!({"a": 1}));
        assert_eq!(data.field("a").unwrap().to_json(), json!(1));
        assert!(data.field("b").is_none());

        let mut fields = BTreeMap::new();
        fields.insert("f".to_string(), SandboxValue::Function(GuestFunction::new(|_| {})));
        let record = SandboxValue::Record(fields);
        assert!(record.field("f").unwrap().as_function().is_some());
    }

    #[test]
    fn to_json_drops_functions() {
        let mut fields = BTreeMap::new();
        fields.insert("n".to_string(), SandboxValue::from(json!(2)));
        fields.insert("f".to_string(), SandboxValue::Function(GuestFunction::new(|_| {})));
        let record = SandboxValue::Record(fields);
        assert_eq!(record.to_json(), json!({"n": 2, "f": null}));
    }

    #[test]
    fn display_string_keeps_strings_verbatim() {
        assert_eq!(SandboxValue::from("hi").to_display_string(), "hi");
        assert_eq!(SandboxValue::from(json!([1, 2])).to_display_string(), "[1,2]");
        assert_eq!(SandboxValue::Null.to_display_string(), "null");
    }

    #[test]
    fn null_checks() {
        assert!(SandboxValue::Null.is_null());
        assert!(SandboxValue::from(json!(null)).is_null());
        assert!(!SandboxValue::from("x").is_null());
    }
}
