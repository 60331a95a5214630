//! Resource configuration catalog.
//!
//! A `ResourceConfig` is a named execution profile: how capable the backing
//! resource is, how fast it responds, and what one work unit costs. The
//! catalog is a fixed table built once at start-up; allocation decisions
//! only ever read it.

use serde::{Deserialize, Serialize};

/// Capability tier of a resource configuration.
///
/// Tiers are totally ordered: `Basic < Advanced < Expert`. A task may only
/// run on a configuration whose tier is at least its declared requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityTier {
    Basic,
    Advanced,
    Expert,
}

impl std::fmt::Display for CapabilityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityTier::Basic => write!(f, "basic"),
            CapabilityTier::Advanced => write!(f, "advanced"),
            CapabilityTier::Expert => write!(f, "expert"),
        }
    }
}

/// Relative speed class of a resource configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedClass {
    Fast,
    Medium,
    Slow,
}

impl SpeedClass {
    /// Weight used when scoring configurations for cost optimization.
    pub fn factor(&self) -> f64 {
        match self {
            SpeedClass::Fast => 1.0,
            SpeedClass::Medium => 0.8,
            SpeedClass::Slow => 0.6,
        }
    }
}

impl std::fmt::Display for SpeedClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeedClass::Fast => write!(f, "fast"),
            SpeedClass::Medium => write!(f, "medium"),
            SpeedClass::Slow => write!(f, "slow"),
        }
    }
}

/// A named execution profile.
///
/// Immutable once the catalog is built; tasks hold a clone of the
/// configuration chosen for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Catalog key, e.g. "scout" or "deep".
    pub name: String,
    /// Capability tier.
    pub tier: CapabilityTier,
    /// Relative speed class.
    pub speed: SpeedClass,
    /// Cost of one work unit. Always >= 0.
    pub cost_per_unit: f64,
    /// Maximum work-unit budget a single task may spend on this profile.
    pub max_units: u32,
}

impl ResourceConfig {
    pub fn new(
        name: &str,
        tier: CapabilityTier,
        speed: SpeedClass,
        cost_per_unit: f64,
        max_units: u32,
    ) -> Self {
        Self {
            name: name.to_string(),
            tier,
            speed,
            cost_per_unit,
            max_units,
        }
    }
}

/// Fixed table of resource configurations.
///
/// Table order matters: the first entry of a tier is that tier's canonical
/// configuration, returned by [`ResourceCatalog::tier_default`].
#[derive(Debug, Clone)]
pub struct ResourceCatalog {
    configs: Vec<ResourceConfig>,
}

impl ResourceCatalog {
    /// Build a catalog from an explicit config list.
    pub fn new(configs: Vec<ResourceConfig>) -> Self {
        Self { configs }
    }

    /// The built-in catalog: five profiles spanning the cost/speed/capability
    /// space.
    pub fn builtin() -> Self {
        Self::new(vec![
            ResourceConfig::new("scout", CapabilityTier::Basic, SpeedClass::Fast, 0.002, 4096),
            ResourceConfig::new(
                "standard",
                CapabilityTier::Advanced,
                SpeedClass::Medium,
                0.003,
                8192,
            ),
            ResourceConfig::new("deep", CapabilityTier::Expert, SpeedClass::Slow, 0.015, 16384),
            ResourceConfig::new(
                "specialist",
                CapabilityTier::Expert,
                SpeedClass::Medium,
                0.010,
                8192,
            ),
            ResourceConfig::new("rapid", CapabilityTier::Advanced, SpeedClass::Fast, 0.003, 4096),
        ])
    }

    /// Look up a configuration by name.
    pub fn get(&self, name: &str) -> Option<&ResourceConfig> {
        self.configs.iter().find(|c| c.name == name)
    }

    /// All configurations in table order.
    pub fn configs(&self) -> &[ResourceConfig] {
        &self.configs
    }

    /// Number of configurations.
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// The first configuration of the given tier, in table order.
    pub fn tier_default(&self, tier: CapabilityTier) -> Option<&ResourceConfig> {
        self.configs.iter().find(|c| c.tier == tier)
    }

    /// The highest-capability configuration: the first entry of the highest
    /// tier present in the table.
    pub fn highest_capability(&self) -> Option<&ResourceConfig> {
        let top = self.configs.iter().map(|c| c.tier).max()?;
        self.tier_default(top)
    }

    /// The fastest configuration whose tier is at least `tier`. Ties on
    /// speed resolve to the cheaper configuration.
    pub fn fastest_at_least(&self, tier: CapabilityTier) -> Option<&ResourceConfig> {
        self.configs
            .iter()
            .filter(|c| c.tier >= tier)
            .min_by(|a, b| {
                b.speed
                    .factor()
                    .partial_cmp(&a.speed.factor())
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(
                        a.cost_per_unit
                            .partial_cmp(&b.cost_per_unit)
                            .unwrap_or(std::cmp::Ordering::Equal),
                    )
            })
    }

    /// All configurations sharing a tier, in table order.
    pub fn tier_members(&self, tier: CapabilityTier) -> Vec<&ResourceConfig> {
        self.configs.iter().filter(|c| c.tier == tier).collect()
    }
}

impl Default for ResourceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(CapabilityTier::Basic < CapabilityTier::Advanced);
        assert!(CapabilityTier::Advanced < CapabilityTier::Expert);
    }

    #[test]
    fn test_speed_factor() {
        assert_eq!(SpeedClass::Fast.factor(), 1.0);
        assert_eq!(SpeedClass::Medium.factor(), 0.8);
        assert_eq!(SpeedClass::Slow.factor(), 0.6);
    }

    #[test]
    fn test_builtin_lookup() {
        let catalog = ResourceCatalog::builtin();
        assert_eq!(catalog.len(), 5);
        assert!(!catalog.is_empty());
        let deep = catalog.get("deep").unwrap();
        assert_eq!(deep.tier, CapabilityTier::Expert);
        assert_eq!(deep.speed, SpeedClass::Slow);
        assert!(catalog.get("unknown").is_none());
        // Costs are never negative and every profile has a unit budget.
        assert!(catalog
            .configs()
            .iter()
            .all(|c| c.cost_per_unit >= 0.0 && c.max_units > 0));
    }

    #[test]
    fn test_tier_default_is_first_in_table_order() {
        let catalog = ResourceCatalog::builtin();
        // "deep" precedes "specialist" in the table, so it is the expert default.
        assert_eq!(catalog.tier_default(CapabilityTier::Expert).unwrap().name, "deep");
        assert_eq!(
            catalog.tier_default(CapabilityTier::Advanced).unwrap().name,
            "standard"
        );
    }

    #[test]
    fn test_highest_capability() {
        let catalog = ResourceCatalog::builtin();
        assert_eq!(catalog.highest_capability().unwrap().tier, CapabilityTier::Expert);
        assert_eq!(catalog.highest_capability().unwrap().name, "deep");
    }

    #[test]
    fn test_fastest_at_least_respects_tier_floor() {
        let catalog = ResourceCatalog::builtin();
        // Fastest config at expert tier or above: "specialist" (medium) beats
        // "deep" (slow).
        let best = catalog.fastest_at_least(CapabilityTier::Expert).unwrap();
        assert_eq!(best.name, "specialist");
        // At basic tier the fast-and-cheapest wins.
        let best = catalog.fastest_at_least(CapabilityTier::Basic).unwrap();
        assert_eq!(best.name, "scout");
    }

    #[test]
    fn test_tier_members() {
        let catalog = ResourceCatalog::builtin();
        let experts: Vec<_> = catalog
            .tier_members(CapabilityTier::Expert)
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(experts, vec!["deep", "specialist"]);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = ResourceConfig::new(
            "standard",
            CapabilityTier::Advanced,
            SpeedClass::Medium,
            0.003,
            8192,
        );
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ResourceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
        assert!(json.contains("advanced"));
    }
}
