//! Agent data model and registry.
//!
//! Agents are the named executors work is assigned to. Each declares a
//! specialty, a priority class, the capability tier it needs, an estimated
//! duration, and the agents it depends on. The registry is loaded once at
//! start-up and validated before any scheduling happens: duplicate ids,
//! dangling dependencies, non-positive durations, and dependency cycles are
//! all load-time errors.

use crate::core::catalog::CapabilityTier;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Unique identifier for an agent.
///
/// Agents are named, so the id is a string slug (e.g. "integration-lead").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Priority class of an agent and the tasks derived from it.
///
/// Variant order doubles as the scheduling order: `Critical` sorts before
/// `High`, and so on down to `Low`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Critical => write!(f, "critical"),
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// Agent lifecycle status. Mutated exclusively by the execution coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Idle,
    Working,
    Waiting,
    Completed,
    Failed,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Working => write!(f, "working"),
            AgentStatus::Waiting => write!(f, "waiting"),
            AgentStatus::Completed => write!(f, "completed"),
            AgentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A named executor role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier.
    pub id: AgentId,
    /// Human-readable name.
    pub name: String,
    /// Free-text specialty description.
    pub specialty: String,
    /// Priority class.
    #[serde(default)]
    pub priority: Priority,
    /// Minimum capability tier this agent's work requires.
    #[serde(default = "default_tier")]
    pub required_tier: CapabilityTier,
    /// Estimated duration in minutes. Must be > 0.
    pub estimated_duration: u32,
    /// Agents that must complete before this one can start.
    #[serde(default)]
    pub dependencies: Vec<AgentId>,
    /// Current lifecycle status.
    #[serde(default)]
    pub status: AgentStatus,
}

fn default_tier() -> CapabilityTier {
    CapabilityTier::Basic
}

impl Agent {
    pub fn new(id: &str, name: &str, specialty: &str) -> Self {
        Self {
            id: AgentId::new(id),
            name: name.to_string(),
            specialty: specialty.to_string(),
            priority: Priority::Medium,
            required_tier: CapabilityTier::Basic,
            estimated_duration: 60,
            dependencies: Vec::new(),
            status: AgentStatus::Idle,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tier(mut self, tier: CapabilityTier) -> Self {
        self.required_tier = tier;
        self
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.estimated_duration = minutes;
        self
    }

    pub fn with_dependencies(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|d| AgentId::new(d)).collect();
        self
    }
}

/// Manifest shape for loading a registry from TOML.
#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    agents: Vec<Agent>,
}

/// The table of known agents.
///
/// Insertion order is preserved so reports and deterministic tie-breaks can
/// rely on it.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<AgentId, Agent>,
    order: Vec<AgentId>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent. Duplicate ids are rejected.
    pub fn insert(&mut self, agent: Agent) -> Result<()> {
        if self.agents.contains_key(&agent.id) {
            return Err(Error::DuplicateAgent(agent.id.to_string()));
        }
        self.order.push(agent.id.clone());
        self.agents.insert(agent.id.clone(), agent);
        Ok(())
    }

    pub fn get(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.agents.contains_key(id)
    }

    /// Set an agent's status. Only the execution coordinator calls this.
    pub fn set_status(&mut self, id: &AgentId, status: AgentStatus) -> Result<()> {
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| Error::UnknownAgent(id.to_string()))?;
        agent.status = status;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agents in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.order.iter().filter_map(|id| self.agents.get(id))
    }

    /// Load a registry from a TOML manifest and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let manifest: Manifest = toml::from_str(&std::fs::read_to_string(path)?)?;
        let mut registry = Self::new();
        for agent in manifest.agents {
            registry.insert(agent)?;
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Validate the whole registry: durations positive, dependencies known,
    /// dependency graph acyclic.
    pub fn validate(&self) -> Result<()> {
        for agent in self.iter() {
            if agent.estimated_duration == 0 {
                return Err(Error::InvalidDuration {
                    agent: agent.id.to_string(),
                });
            }
            for dep in &agent.dependencies {
                if !self.agents.contains_key(dep) {
                    return Err(Error::UnknownDependency {
                        agent: agent.id.to_string(),
                        dependency: dep.to_string(),
                    });
                }
            }
        }
        self.check_acyclic()
    }

    /// Depth-first cycle check over the dependency edges.
    fn check_acyclic(&self) -> Result<()> {
        // 0 = unvisited, 1 = on stack, 2 = done
        let mut state: HashMap<&AgentId, u8> = HashMap::new();

        fn visit<'a>(
            id: &'a AgentId,
            agents: &'a HashMap<AgentId, Agent>,
            state: &mut HashMap<&'a AgentId, u8>,
            stack: &mut Vec<&'a AgentId>,
        ) -> bool {
            match state.get(id) {
                Some(2) => return true,
                Some(1) => return false,
                _ => {}
            }
            state.insert(id, 1);
            stack.push(id);
            if let Some(agent) = agents.get(id) {
                for dep in &agent.dependencies {
                    if !visit(dep, agents, state, stack) {
                        return false;
                    }
                }
            }
            stack.pop();
            state.insert(id, 2);
            true
        }

        for id in &self.order {
            let mut stack = Vec::new();
            if !visit(id, &self.agents, &mut state, &mut stack) {
                let mut agents: Vec<String> = stack.iter().map(|a| a.to_string()).collect();
                agents.sort();
                return Err(Error::DependencyCycle { agents });
            }
        }
        Ok(())
    }

    /// Sum of dependency edges, mostly useful for diagnostics.
    pub fn dependency_count(&self) -> usize {
        self.agents.values().map(|a| a.dependencies.len()).sum()
    }
}
