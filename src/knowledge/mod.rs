//! Knowledge store: learned (strategy, task-shape) associations.
//!
//! Every execution outcome is folded into a `KnowledgeRecord` keyed by
//! (category, complexity, priority). On the next run, the planner asks the
//! store first; only when it has nothing does the static allocation
//! strategy decide. Success rates are exponentially weighted so recent
//! outcomes dominate.
//!
//! The backing medium is pluggable and treated as unreliable: any load or
//! save failure switches the store to in-memory-only operation. The switch
//! is logged once and is never an error for the caller.

pub mod backend;

pub use backend::{JsonFileBackend, KnowledgeBackend, KnowledgeSnapshot, MemoryBackend};

use crate::core::agent::{AgentId, Priority};
use crate::core::task::Complexity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Outcome of one task execution, as reported by the executor collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Partial,
    Failure,
}

impl Outcome {
    /// Weight folded into the exponentially-weighted success rate.
    pub fn weight(&self) -> f64 {
        match self {
            Outcome::Success => 1.0,
            Outcome::Partial => 0.5,
            Outcome::Failure => 0.0,
        }
    }

    /// Whether the outcome produced usable output (dependency-satisfying).
    pub fn is_productive(&self) -> bool {
        !matches!(self, Outcome::Failure)
    }
}

/// The strategy payload a record stores: which resource configuration was
/// used for this task shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyPayload {
    /// Catalog name of the resource configuration.
    pub resource: String,
}

impl StrategyPayload {
    pub fn new(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
        }
    }
}

/// Observed metrics attached to an outcome.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OutcomeMetrics {
    /// Actual task duration in minutes.
    pub minutes: f64,
    /// Work units the executor reported consuming.
    pub units_consumed: u32,
}

/// A learned association for one task shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub category: String,
    pub complexity: Complexity,
    pub priority: Priority,
    pub strategy: StrategyPayload,
    /// Exponentially-weighted success rate in [0, 1].
    pub success_rate: f64,
    pub usage_count: u64,
    pub last_used: DateTime<Utc>,
}

impl KnowledgeRecord {
    fn matches(&self, category: &str, complexity: Complexity, priority: Priority) -> bool {
        self.category == category && self.complexity == complexity && self.priority == priority
    }

    /// Fold one outcome into the success rate: `new = (old + weight) / 2`.
    fn absorb(&mut self, outcome: Outcome) {
        self.success_rate = (self.success_rate + outcome.weight()) / 2.0;
        self.usage_count += 1;
        self.last_used = Utc::now();
    }
}

/// Rolling per-agent performance profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: AgentId,
    /// Rolling average task duration in minutes.
    pub average_minutes: f64,
    /// Exponentially-weighted success rate in [0, 1].
    pub success_rate: f64,
    /// Tasks this agent has finished, successfully or not.
    pub tasks_finished: u64,
}

impl AgentProfile {
    fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            average_minutes: 0.0,
            success_rate: 0.0,
            tasks_finished: 0,
        }
    }
}

/// Summary view returned by [`KnowledgeStore::summarize`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSummary {
    pub record_count: usize,
    pub profile_count: usize,
    /// Whether persistence has degraded to in-memory-only.
    pub degraded: bool,
    /// Up to five records with the highest success rates.
    pub top_records: Vec<KnowledgeRecord>,
}

/// The knowledge store.
pub struct KnowledgeStore {
    records: Vec<KnowledgeRecord>,
    profiles: Vec<AgentProfile>,
    backend: Box<dyn KnowledgeBackend>,
    degraded: bool,
}

impl KnowledgeStore {
    /// Open a store over the given backend. A failing backend is not an
    /// error: the store starts empty and stays in memory.
    pub fn open(backend: Box<dyn KnowledgeBackend>) -> Self {
        let mut degraded = false;
        let snapshot = match backend.load() {
            Ok(snapshot) => snapshot.unwrap_or_default(),
            Err(e) => {
                warn!(
                    backend = %backend.describe(),
                    error = %e,
                    "knowledge backend unavailable, continuing in memory"
                );
                degraded = true;
                KnowledgeSnapshot::default()
            }
        };
        Self {
            records: snapshot.records,
            profiles: snapshot.profiles,
            backend,
            degraded,
        }
    }

    /// Open a store with the in-memory backend.
    pub fn in_memory() -> Self {
        Self::open(Box::new(MemoryBackend::new()))
    }

    /// Whether persistence has degraded to in-memory-only.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Best known strategy for a task shape, or `None` when nothing has
    /// been learned yet (caller falls back to the allocation strategy).
    ///
    /// Candidates with the same key are ranked by success rate, then usage
    /// count. The winning record's usage count and last-used stamp are
    /// bumped.
    pub fn optimal_strategy(
        &mut self,
        category: &str,
        complexity: Complexity,
        priority: Priority,
    ) -> Option<StrategyPayload> {
        let best = self
            .records
            .iter_mut()
            .filter(|r| r.matches(category, complexity, priority))
            .max_by(|a, b| {
                a.success_rate
                    .partial_cmp(&b.success_rate)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.usage_count.cmp(&b.usage_count))
            })?;

        best.usage_count += 1;
        best.last_used = Utc::now();
        let strategy = best.strategy.clone();
        debug!(
            category,
            %complexity,
            %priority,
            resource = %strategy.resource,
            success_rate = best.success_rate,
            "knowledge hit"
        );
        self.persist();
        Some(strategy)
    }

    /// Best known success rate for a task shape, without touching usage
    /// counters. Used for plan-level success estimation.
    pub fn expected_success(
        &self,
        category: &str,
        complexity: Complexity,
        priority: Priority,
    ) -> Option<f64> {
        self.records
            .iter()
            .filter(|r| r.matches(category, complexity, priority))
            .map(|r| r.success_rate)
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Fold an execution outcome into the matching record, creating it on
    /// first observation.
    pub fn record_outcome(
        &mut self,
        category: &str,
        complexity: Complexity,
        priority: Priority,
        strategy: StrategyPayload,
        outcome: Outcome,
        metrics: OutcomeMetrics,
    ) {
        let index = self
            .records
            .iter()
            .position(|r| r.matches(category, complexity, priority) && r.strategy == strategy);

        let index = match index {
            Some(index) => index,
            None => {
                self.records.push(KnowledgeRecord {
                    category: category.to_string(),
                    complexity,
                    priority,
                    strategy,
                    success_rate: 0.0,
                    usage_count: 0,
                    last_used: Utc::now(),
                });
                self.records.len() - 1
            }
        };
        self.records[index].absorb(outcome);
        debug!(
            category,
            %complexity,
            %priority,
            ?outcome,
            minutes = metrics.minutes,
            units = metrics.units_consumed,
            "outcome recorded"
        );
        self.persist();
    }

    /// Fold one finished task into the agent's rolling profile.
    pub fn update_agent_profile(&mut self, agent_id: &AgentId, minutes: f64, outcome: Outcome) {
        let index = match self.profiles.iter().position(|p| &p.agent_id == agent_id) {
            Some(index) => index,
            None => {
                self.profiles.push(AgentProfile::new(agent_id.clone()));
                self.profiles.len() - 1
            }
        };
        let profile = &mut self.profiles[index];
        let n = profile.tasks_finished as f64;
        profile.average_minutes = (profile.average_minutes * n + minutes) / (n + 1.0);
        profile.success_rate = (profile.success_rate + outcome.weight()) / 2.0;
        profile.tasks_finished += 1;
        self.persist();
    }

    /// Profile for a single agent, if any outcomes have been recorded.
    pub fn agent_profile(&self, agent_id: &AgentId) -> Option<&AgentProfile> {
        self.profiles.iter().find(|p| &p.agent_id == agent_id)
    }

    /// Summarize the store's contents.
    pub fn summarize(&self) -> KnowledgeSummary {
        let mut top: Vec<KnowledgeRecord> = self.records.clone();
        top.sort_by(|a, b| {
            b.success_rate
                .partial_cmp(&a.success_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.usage_count.cmp(&a.usage_count))
        });
        top.truncate(5);
        KnowledgeSummary {
            record_count: self.records.len(),
            profile_count: self.profiles.len(),
            degraded: self.degraded,
            top_records: top,
        }
    }

    /// Push the current state to the backend. Failure flips the store into
    /// degraded mode; logged once, never surfaced.
    fn persist(&mut self) {
        if self.degraded {
            return;
        }
        let snapshot = KnowledgeSnapshot {
            records: self.records.clone(),
            profiles: self.profiles.clone(),
        };
        if let Err(e) = self.backend.save(&snapshot) {
            warn!(
                backend = %self.backend.describe(),
                error = %e,
                "knowledge backend write failed, continuing in memory"
            );
            self.degraded = true;
        }
    }
}
