//! Resource URI policy handed to the sandbox engine.
//!
//! The engine consults the policy for every resource URI sandboxed code
//! asks for. `None` means the request is refused.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub trait UriPolicy: Send + Sync {
    /// Returns the URI to fetch instead of `uri`, or `None` to refuse it.
    fn rewrite(&self, uri: &str) -> Option<String>;
}

/// Refuses every URI.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAllUriPolicy;

impl UriPolicy for DenyAllUriPolicy {
    fn rewrite(&self, _uri: &str) -> Option<String> {
        None
    }
}

/// Returns every URI unchanged. Offers no protection.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughUriPolicy;

impl UriPolicy for PassThroughUriPolicy {
    fn rewrite(&self, uri: &str) -> Option<String> {
        Some(uri.to_string())
    }
}

/// Allows URIs starting with one of the configured prefixes.
#[derive(Debug, Clone, Default)]
pub struct PrefixAllowlistUriPolicy {
    prefixes: Vec<String>,
}

impl PrefixAllowlistUriPolicy {
    pub fn new(prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }
}

impl UriPolicy for PrefixAllowlistUriPolicy {
    fn rewrite(&self, uri: &str) -> Option<String> {
        // Relative and protocol-relative tricks never match an absolute prefix.
        self.prefixes
            .iter()
            .any(|p| !p.is_empty() && uri.starts_with(p.as_str()))
            .then(|| uri.to_string())
    }
}

/// Configured URI policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum UriPolicyConfig {
    #[default]
    DenyAll,
    PassThrough,
    Allowlist {
        #[serde(default)]
        prefixes: Vec<String>,
    },
}

impl UriPolicyConfig {
    pub fn build(&self) -> Arc<dyn UriPolicy> {
        match self {
            Self::DenyAll => Arc::new(DenyAllUriPolicy),
            Self::PassThrough => Arc::new(PassThroughUriPolicy),
            Self::Allowlist { prefixes } => {
                Arc::new(PrefixAllowlistUriPolicy::new(prefixes.iter().cloned()))
            }
        }
    }
}
