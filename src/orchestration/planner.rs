//! Task submission and execution planning.
//!
//! A run starts as a batch of [`TaskSpec`]s, one per unit of work. The
//! planner validates the batch against the agent registry, picks a resource
//! configuration for every task (knowledge store first, static allocation
//! strategy as fallback), and produces the [`ExecutionPlan`]: a
//! deterministic execution order with aggregate cost/duration/success
//! estimates.
//!
//! The order is computed with a priority-aware Kahn traversal: repeatedly
//! emit, among the tasks whose dependencies have all been emitted, the one
//! with the best (priority, estimated duration, name) key. The result is
//! always a valid topological order, critical work surfaces as early as its
//! dependencies allow, and equal-readiness ties resolve to the shorter
//! task.

use crate::allocation::AllocationStrategy;
use crate::core::agent::{AgentId, AgentRegistry, Priority};
use crate::core::dag::TaskDag;
use crate::core::task::{Complexity, Task, TaskId, TaskStatus};
use crate::error::{Error, Result};
use crate::knowledge::KnowledgeStore;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Assumed success rate for task shapes the knowledge store has never seen.
pub const DEFAULT_SUCCESS_RATE: f64 = 0.85;

/// One entry of a submission batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// The agent this work is assigned to. Must exist in the registry.
    pub agent: AgentId,
    /// Task name; defaults to the agent's name.
    #[serde(default)]
    pub name: Option<String>,
    /// Free-form classification used for knowledge lookups.
    pub category: String,
    /// Priority; defaults to the agent's priority class.
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub complexity: Complexity,
    /// Prerequisite agents; defaults to the agent's declared dependencies.
    #[serde(default)]
    pub dependencies: Option<Vec<AgentId>>,
    /// Estimated duration in minutes; defaults to the agent's estimate.
    #[serde(default)]
    pub estimated_duration: Option<u32>,
}

impl TaskSpec {
    /// Derive the 1:1 spec for an agent, inheriting its priority,
    /// dependencies, and duration. Complexity follows the declared
    /// capability tier.
    pub fn from_agent(agent: &crate::core::agent::Agent) -> Self {
        use crate::core::catalog::CapabilityTier;
        let complexity = match agent.required_tier {
            CapabilityTier::Expert => Complexity::Expert,
            CapabilityTier::Advanced => Complexity::Complex,
            CapabilityTier::Basic => Complexity::Moderate,
        };
        Self {
            agent: agent.id.clone(),
            name: Some(agent.name.clone()),
            category: agent.specialty.clone(),
            priority: Some(agent.priority),
            complexity,
            dependencies: Some(agent.dependencies.clone()),
            estimated_duration: Some(agent.estimated_duration),
        }
    }
}

/// The ordered, resource-allocated schedule for a run.
///
/// A read-only snapshot: if the task set changes, build a new plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Task ids in execution order (topologically valid, priority-sorted).
    pub execution_order: Vec<TaskId>,
    /// Resource configuration name chosen for each task.
    pub allocations: HashMap<TaskId, String>,
    /// Sum of estimated durations, in minutes.
    pub estimated_duration: u32,
    /// Sum of estimated costs.
    pub estimated_cost: f64,
    /// Mean expected success rate across tasks.
    pub estimated_success_rate: f64,
}

impl ExecutionPlan {
    /// The next runnable task: the first pending task in execution order
    /// whose dependencies are all in the completed set. `None` means
    /// nothing can run right now (outstanding dependencies, or the run is
    /// finished).
    pub fn next_available(&self, dag: &TaskDag, completed: &HashSet<TaskId>) -> Option<TaskId> {
        self.execution_order.iter().copied().find(|id| {
            dag.get(id).is_some_and(|task| {
                task.status == TaskStatus::Pending
                    && task.dependencies.iter().all(|d| completed.contains(d))
            })
        })
    }
}

/// Validate a submission batch and produce the run's tasks and plan.
///
/// The knowledge store is consulted first for every task shape; its
/// suggestion is honored only when the named configuration still exists in
/// the catalog and covers the task's capability requirement. Otherwise the
/// static allocation strategy decides.
pub fn build_plan(
    registry: &AgentRegistry,
    strategy: &AllocationStrategy,
    knowledge: &mut KnowledgeStore,
    specs: &[TaskSpec],
) -> Result<(Vec<Task>, ExecutionPlan)> {
    let mut tasks = Vec::with_capacity(specs.len());
    let mut agent_deps = Vec::with_capacity(specs.len());
    let mut by_agent: HashMap<AgentId, Vec<TaskId>> = HashMap::new();

    // First pass: materialize tasks with allocations; dependency ids are
    // resolved in a second pass once every task id exists.
    for spec in specs {
        let agent = registry
            .get(&spec.agent)
            .ok_or_else(|| Error::UnknownAgent(spec.agent.to_string()))?;

        let priority = spec.priority.unwrap_or(agent.priority);
        let duration = spec.estimated_duration.unwrap_or(agent.estimated_duration);
        if duration == 0 {
            return Err(Error::InvalidDuration {
                agent: agent.id.to_string(),
            });
        }

        let resource = match knowledge.optimal_strategy(&spec.category, spec.complexity, priority)
        {
            Some(learned) => match strategy.catalog().get(&learned.resource) {
                Some(config) if config.tier >= agent.required_tier => config.clone(),
                _ => {
                    debug!(
                        resource = %learned.resource,
                        agent = %agent.id,
                        "learned strategy unusable, falling back to static allocation"
                    );
                    strategy
                        .select_config(priority, spec.complexity, agent.required_tier)
                        .clone()
                }
            },
            None => strategy
                .select_config(priority, spec.complexity, agent.required_tier)
                .clone(),
        };

        let name = spec.name.clone().unwrap_or_else(|| agent.name.clone());
        let task = Task::new(
            &name,
            &spec.category,
            priority,
            spec.complexity,
            agent.id.clone(),
            resource,
            Vec::new(),
            duration,
        );
        by_agent.entry(agent.id.clone()).or_default().push(task.id);
        agent_deps.push(
            spec.dependencies
                .clone()
                .unwrap_or_else(|| agent.dependencies.clone()),
        );
        tasks.push(task);
    }

    // Second pass: translate agent-level dependencies into task ids.
    for (task, deps) in tasks.iter_mut().zip(&agent_deps) {
        for dep in deps {
            let dep_tasks = by_agent.get(dep).ok_or_else(|| Error::UnknownDependency {
                agent: task.agent_id.to_string(),
                dependency: dep.to_string(),
            })?;
            task.dependencies.extend(dep_tasks.iter().copied());
        }
    }

    // Cycle detection happens here; a cyclic batch produces no plan.
    TaskDag::from_tasks(tasks.clone())?;

    let execution_order = plan_order(&tasks);
    let allocations = tasks
        .iter()
        .map(|t| (t.id, t.resource.name.clone()))
        .collect();
    let estimated_duration = tasks.iter().map(|t| t.estimated_duration).sum();
    let estimated_cost = tasks.iter().map(|t| t.estimated_cost()).sum();
    let estimated_success_rate = if tasks.is_empty() {
        1.0
    } else {
        tasks
            .iter()
            .map(|t| {
                knowledge
                    .expected_success(&t.category, t.complexity, t.priority)
                    .unwrap_or(DEFAULT_SUCCESS_RATE)
            })
            .sum::<f64>()
            / tasks.len() as f64
    };

    let plan = ExecutionPlan {
        execution_order,
        allocations,
        estimated_duration,
        estimated_cost,
        estimated_success_rate,
    };
    Ok((tasks, plan))
}

/// Deterministic priority-aware topological order.
fn plan_order(tasks: &[Task]) -> Vec<TaskId> {
    let mut order = Vec::with_capacity(tasks.len());
    let mut emitted: HashSet<TaskId> = HashSet::new();
    let mut remaining: Vec<&Task> = tasks.iter().collect();

    while !remaining.is_empty() {
        let next = remaining
            .iter()
            .enumerate()
            .filter(|(_, t)| t.dependencies.iter().all(|d| emitted.contains(d)))
            .min_by(|(_, a), (_, b)| {
                a.priority
                    .cmp(&b.priority)
                    .then(a.estimated_duration.cmp(&b.estimated_duration))
                    .then_with(|| a.name.cmp(&b.name))
            })
            .map(|(i, _)| i);

        // The dag was validated acyclic before this runs.
        let Some(index) = next else { break };
        let task = remaining.remove(index);
        emitted.insert(task.id);
        order.push(task.id);
    }

    order
}
