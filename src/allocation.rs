//! Resource allocation strategy.
//!
//! Given a task's priority, complexity, and capability requirement, the
//! strategy picks the resource configuration that best balances capability
//! match, latency, and cost. Selection is a pure function of its inputs and
//! the static catalog; the adaptive layer lives in the knowledge store,
//! which overrides these defaults when it has learned something better.

use crate::core::agent::Priority;
use crate::core::catalog::{CapabilityTier, ResourceCatalog, ResourceConfig};
use crate::core::task::Complexity;
use serde::{Deserialize, Serialize};

/// How urgently a task needs to finish. Derived from priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSensitivity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<Priority> for TimeSensitivity {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Critical => TimeSensitivity::Critical,
            Priority::High => TimeSensitivity::High,
            Priority::Medium => TimeSensitivity::Medium,
            Priority::Low => TimeSensitivity::Low,
        }
    }
}

/// Result of a cost-optimization scan over same-tier configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostOptimization {
    /// The best-scoring configuration of the chosen tier.
    pub recommended: ResourceConfig,
    /// Cost delta of the recommendation versus the original choice, over
    /// the task's estimated work units. Positive means cheaper.
    pub cost_savings: f64,
    /// Composite efficiency score of the recommendation.
    pub efficiency_gain: f64,
}

/// Selects resource configurations from the catalog.
pub struct AllocationStrategy {
    catalog: ResourceCatalog,
}

impl AllocationStrategy {
    pub fn new(catalog: ResourceCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    /// Pick the configuration for a task.
    ///
    /// Rules, in order:
    /// 1. critical priority always gets the highest-capability configuration;
    /// 2. expert complexity or an expert requirement gets the expert tier;
    /// 3. complex complexity or an advanced requirement gets the advanced tier;
    /// 4. critical time sensitivity gets the fastest configuration whose
    ///    tier covers the requirement;
    /// 5. otherwise the advanced tier is the balanced default.
    pub fn select_config(
        &self,
        priority: Priority,
        complexity: Complexity,
        required_tier: CapabilityTier,
    ) -> &ResourceConfig {
        let sensitivity = TimeSensitivity::from(priority);

        if priority == Priority::Critical {
            return self
                .catalog
                .highest_capability()
                .expect("catalog is never empty");
        }

        if complexity == Complexity::Expert || required_tier == CapabilityTier::Expert {
            return self.tier_or_top(CapabilityTier::Expert);
        }

        if complexity == Complexity::Complex || required_tier == CapabilityTier::Advanced {
            return self.tier_or_top(CapabilityTier::Advanced);
        }

        if sensitivity == TimeSensitivity::Critical {
            if let Some(config) = self.catalog.fastest_at_least(required_tier) {
                return config;
            }
        }

        self.tier_or_top(CapabilityTier::Advanced)
    }

    fn tier_or_top(&self, tier: CapabilityTier) -> &ResourceConfig {
        self.catalog
            .tier_default(tier)
            .or_else(|| self.catalog.highest_capability())
            .expect("catalog is never empty")
    }

    /// Scan all configurations of the chosen configuration's tier and score
    /// them by speed, capability match, and cost efficiency. Returns the
    /// highest scorer and its cost delta versus the original choice.
    pub fn cost_optimize(
        &self,
        complexity: Complexity,
        required_tier: CapabilityTier,
        chosen: &ResourceConfig,
    ) -> CostOptimization {
        let estimated_units = f64::from(complexity.work_units());

        let mut recommended = chosen;
        let mut best_score = efficiency_score(chosen, required_tier);

        for candidate in self.catalog.tier_members(chosen.tier) {
            let score = efficiency_score(candidate, required_tier);
            if score > best_score {
                best_score = score;
                recommended = candidate;
            }
        }

        CostOptimization {
            recommended: recommended.clone(),
            cost_savings: (chosen.cost_per_unit - recommended.cost_per_unit) * estimated_units,
            efficiency_gain: best_score,
        }
    }
}

/// Composite efficiency score of a configuration for a given requirement:
/// `0.4 * speed + 0.4 * capability match + 0.2 * normalized cost`.
fn efficiency_score(config: &ResourceConfig, required_tier: CapabilityTier) -> f64 {
    let speed = config.speed.factor();
    let capability = if config.tier == required_tier { 1.0 } else { 0.7 };
    // Cost efficiency normalized against the catalog's cost magnitudes so
    // the cheapest profiles approach 1.0.
    let cost = (0.002 / config.cost_per_unit.max(f64::EPSILON)).min(1.0);
    0.4 * speed + 0.4 * capability + 0.2 * cost
}
