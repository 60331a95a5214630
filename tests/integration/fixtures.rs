//! Test fixtures for integration tests.
//!
//! Provides crew builders and a coordinator harness wired to the simulated
//! executor.

use std::sync::Arc;
use tokio::sync::mpsc;

use foreman::allocation::AllocationStrategy;
use foreman::core::catalog::ResourceCatalog;
use foreman::core::{Agent, AgentRegistry, Priority};
use foreman::knowledge::KnowledgeStore;
use foreman::orchestration::{
    build_plan, Coordinator, CoordinatorOptions, ExecutionPlan, Executor, RunEvent,
    SimulatedExecutor, TaskFinished, TaskSpec,
};

/// A quick agent with a 10 minute estimate and no dependencies.
pub fn agent(id: &str) -> Agent {
    Agent::new(id, id, "ops").with_duration(10)
}

/// Build a registry plus 1:1 task specs from a list of agents.
pub fn crew(agents: Vec<Agent>) -> (AgentRegistry, Vec<TaskSpec>) {
    let mut registry = AgentRegistry::new();
    let mut specs = Vec::new();
    for agent in agents {
        specs.push(TaskSpec::from_agent(&agent));
        registry.insert(agent).unwrap();
    }
    (registry, specs)
}

/// Build a plan for a crew with a fresh in-memory knowledge store.
pub fn plan_for(
    registry: &AgentRegistry,
    specs: &[TaskSpec],
) -> (Vec<foreman::core::Task>, ExecutionPlan) {
    let strategy = AllocationStrategy::new(ResourceCatalog::builtin());
    let mut knowledge = KnowledgeStore::in_memory();
    build_plan(registry, &strategy, &mut knowledge, specs).unwrap()
}

/// A coordinator plus its channels, ready to run.
pub struct Harness {
    pub coordinator: Coordinator,
    pub finished_rx: mpsc::Receiver<TaskFinished>,
    pub events_rx: mpsc::Receiver<RunEvent>,
    pub plan: ExecutionPlan,
}

impl Harness {
    /// Wire a crew to an executor under the given cap.
    pub fn new(agents: Vec<Agent>, executor: Arc<dyn Executor>, max_concurrent: usize) -> Self {
        let (registry, specs) = crew(agents);
        let strategy = AllocationStrategy::new(ResourceCatalog::builtin());
        let mut knowledge = KnowledgeStore::in_memory();
        let (tasks, plan) = build_plan(&registry, &strategy, &mut knowledge, &specs).unwrap();
        let options = CoordinatorOptions {
            max_concurrent,
            ..Default::default()
        };
        let (coordinator, finished_rx, events_rx) = Coordinator::new(
            tasks,
            plan.clone(),
            registry,
            knowledge,
            executor,
            options,
        )
        .unwrap();
        Self {
            coordinator,
            finished_rx,
            events_rx,
            plan,
        }
    }

    /// Harness with the instant simulated executor.
    pub fn instant(agents: Vec<Agent>, max_concurrent: usize) -> Self {
        Self::new(agents, Arc::new(SimulatedExecutor::new(0)), max_concurrent)
    }
}

/// A chain crew: each agent depends on the previous one.
pub fn chain(ids: &[&str]) -> Vec<Agent> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            let mut a = agent(id);
            if i > 0 {
                a = a.with_dependencies(&[ids[i - 1]]);
            }
            a
        })
        .collect()
}

/// Independent agents with mixed priorities.
pub fn mixed_priorities() -> Vec<Agent> {
    vec![
        agent("urgent").with_priority(Priority::Critical),
        agent("later").with_priority(Priority::Low),
        agent("last").with_priority(Priority::Low),
    ]
}
