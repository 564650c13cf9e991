//! Capability allow-list for sandboxed applications.
//!
//! Capabilities are grouped in tiers. The host decides which tiers are
//! enabled; sandboxed code can neither request a tier nor name a
//! capability outside the enabled ones.
//!
//! - Basic: template, Socket, alert, log (enabled by default)
//! - Introspection: describe

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One host-provided function that sandboxed code may call by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    // Basic
    Template,
    Socket,
    Alert,
    Log,

    // Introspection
    Describe,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Self::Template,
        Self::Socket,
        Self::Alert,
        Self::Log,
        Self::Describe,
    ];

    /// Returns the tier this capability belongs to.
    pub fn tier(&self) -> CapabilityTier {
        match self {
            Self::Template | Self::Socket | Self::Alert | Self::Log => CapabilityTier::Basic,
            Self::Describe => CapabilityTier::Introspection,
        }
    }

    /// Name under which the capability is exposed to sandboxed code.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::Socket => "Socket",
            Self::Alert => "alert",
            Self::Log => "log",
            Self::Describe => "describe",
        }
    }
}

/// Named group of capabilities enabled or disabled as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityTier {
    Basic,
    Introspection,
}

impl CapabilityTier {
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Self::Basic => &[
                Capability::Template,
                Capability::Socket,
                Capability::Alert,
                Capability::Log,
            ],
            Self::Introspection => &[Capability::Describe],
        }
    }
}

/// Tiers the host has enabled for every application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierSet {
    enabled: BTreeSet<CapabilityTier>,
}

impl TierSet {
    /// Only the basic tier.
    pub fn baseline() -> Self {
        Self::from_tiers([CapabilityTier::Basic])
    }

    pub fn from_tiers(tiers: impl IntoIterator<Item = CapabilityTier>) -> Self {
        Self {
            enabled: tiers.into_iter().collect(),
        }
    }

    /// No tiers at all: applications get an empty library.
    pub fn none() -> Self {
        Self {
            enabled: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, tier: CapabilityTier) -> Self {
        self.enabled.insert(tier);
        self
    }

    pub fn is_enabled(&self, tier: CapabilityTier) -> bool {
        self.enabled.contains(&tier)
    }

    pub fn tiers(&self) -> impl Iterator<Item = CapabilityTier> + '_ {
        self.enabled.iter().copied()
    }

    /// Every capability allowed by the enabled tiers.
    pub fn allowed(&self) -> BTreeSet<Capability> {
        self.enabled
            .iter()
            .flat_map(|t| t.capabilities().iter().copied())
            .collect()
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.is_enabled(capability.tier())
    }
}

impl Default for TierSet {
    fn default() -> Self {
        Self::baseline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_allows_basic_only() {
        let tiers = TierSet::baseline();
        assert!(tiers.allows(Capability::Template));
        assert!(tiers.allows(Capability::Socket));
        assert!(tiers.allows(Capability::Alert));
        assert!(tiers.allows(Capability::Log));
        assert!(!tiers.allows(Capability::Describe));
        assert_eq!(tiers.allowed().len(), 4);
    }

    #[test]
    fn enabling_introspection_adds_describe() {
        let tiers = TierSet::baseline().with(CapabilityTier::Introspection);
        assert!(tiers.allows(Capability::Describe));
        assert_eq!(tiers.allowed().len(), 5);
    }

    #[test]
    fn none_allows_nothing() {
        let tiers = TierSet::none();
        assert!(tiers.allowed().is_empty());
        for c in Capability::ALL {
            assert!(!tiers.allows(c));
        }
    }

    #[test]
    fn every_capability_is_in_its_tier() {
        for c in Capability::ALL {
            assert!(c.tier().capabilities().contains(&c));
        }
    }

    #[test]
    fn exposed_names() {
        assert_eq!(Capability::Template.name(), "template");
        assert_eq!(Capability::Socket.name(), "Socket");
        assert_eq!(Capability::Alert.name(), "alert");
        assert_eq!(Capability::Log.name(), "log");
        assert_eq!(Capability::Describe.name(), "describe");
    }

    #[test]
    fn tier_set_serde_as_list() {
        let tiers = TierSet::baseline().with(CapabilityTier::Introspection);
        let json = serde_json::to_string(&tiers).unwrap();
        assert_eq!(json, r#"["basic","introspection"]"#);
        let back: TierSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tiers);
    }
}
