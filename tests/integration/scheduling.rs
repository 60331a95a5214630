//! Plan building and execution-order properties.

use std::collections::HashMap;

use foreman::allocation::AllocationStrategy;
use foreman::core::catalog::{CapabilityTier, ResourceCatalog};
use foreman::core::{AgentId, Complexity, Priority, TaskId};
use foreman::error::Error;
use foreman::knowledge::KnowledgeStore;
use foreman::orchestration::build_plan;

use crate::fixtures::{agent, chain, crew, mixed_priorities, plan_for};

/// The execution order never places a task before one of its dependencies.
#[test]
fn execution_order_is_topological() {
    let (registry, specs) = crew(vec![
        agent("a"),
        agent("b").with_dependencies(&["a"]),
        agent("c").with_dependencies(&["a"]),
        agent("d").with_dependencies(&["b", "c"]),
        agent("e"),
    ]);
    let (tasks, plan) = plan_for(&registry, &specs);

    let position: HashMap<TaskId, usize> = plan
        .execution_order
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, i))
        .collect();
    for task in &tasks {
        for dep in &task.dependencies {
            assert!(position[dep] < position[&task.id]);
        }
    }
}

/// Scenario A: three independent tasks with priorities critical/low/low
/// start with the critical one.
#[test]
fn critical_task_leads_the_order() {
    let (registry, specs) = crew(mixed_priorities());
    let (tasks, plan) = plan_for(&registry, &specs);

    let first = tasks
        .iter()
        .find(|t| t.id == plan.execution_order[0])
        .unwrap();
    assert_eq!(first.agent_id, AgentId::new("urgent"));
}

/// Scenario B: a chain submitted as [C, A, B] still plans as [A, B, C].
#[test]
fn submission_order_is_irrelevant() {
    let agents = chain(&["a", "b", "c"]);
    let (registry, mut specs) = crew(agents);
    specs.rotate_left(2); // submit as [c, a, b]

    let (tasks, plan) = plan_for(&registry, &specs);
    let order: Vec<String> = plan
        .execution_order
        .iter()
        .map(|id| {
            tasks
                .iter()
                .find(|t| t.id == *id)
                .unwrap()
                .agent_id
                .to_string()
        })
        .collect();
    assert_eq!(order, vec!["a", "b", "c"]);
}

/// Scenario C: a dependency cycle is rejected at plan-build time.
#[test]
fn cycle_is_rejected_with_graph_error() {
    let (registry, mut specs) = crew(vec![agent("a"), agent("b")]);
    specs[0].dependencies = Some(vec![AgentId::new("b")]);
    specs[1].dependencies = Some(vec![AgentId::new("a")]);

    let strategy = AllocationStrategy::new(ResourceCatalog::builtin());
    let mut knowledge = KnowledgeStore::in_memory();
    let err = build_plan(&registry, &strategy, &mut knowledge, &specs).unwrap_err();
    assert!(matches!(err, Error::DependencyCycle { .. }));
}

/// Equal-priority independent tasks order by shorter estimated duration.
#[test]
fn duration_breaks_priority_ties() {
    let (registry, specs) = crew(vec![
        agent("slow").with_duration(120),
        agent("quick").with_duration(15),
        agent("middling").with_duration(60),
    ]);
    let (tasks, plan) = plan_for(&registry, &specs);

    let order: Vec<String> = plan
        .execution_order
        .iter()
        .map(|id| {
            tasks
                .iter()
                .find(|t| t.id == *id)
                .unwrap()
                .agent_id
                .to_string()
        })
        .collect();
    assert_eq!(order, vec!["quick", "middling", "slow"]);
}

/// `select_config` is a pure function: the same inputs always produce the
/// same configuration.
#[test]
fn selection_is_pure() {
    let strategy = AllocationStrategy::new(ResourceCatalog::builtin());
    let combos = [
        (Priority::Critical, Complexity::Simple, CapabilityTier::Basic),
        (Priority::High, Complexity::Expert, CapabilityTier::Advanced),
        (Priority::Medium, Complexity::Complex, CapabilityTier::Basic),
        (Priority::Low, Complexity::Moderate, CapabilityTier::Expert),
    ];
    for (priority, complexity, tier) in combos {
        let first = strategy.select_config(priority, complexity, tier).clone();
        for _ in 0..5 {
            assert_eq!(strategy.select_config(priority, complexity, tier), &first);
        }
        // Invariant: the chosen tier covers the requirement.
        assert!(first.tier >= tier);
    }
}

/// Plan aggregates roll up from the task set.
#[test]
fn plan_estimates_roll_up() {
    let (registry, specs) = crew(vec![
        agent("a").with_duration(30),
        agent("b").with_duration(45),
    ]);
    let (tasks, plan) = plan_for(&registry, &specs);

    assert_eq!(plan.estimated_duration, 75);
    let expected_cost: f64 = tasks.iter().map(|t| t.estimated_cost()).sum();
    assert!((plan.estimated_cost - expected_cost).abs() < 1e-9);
    assert!(plan.estimated_success_rate > 0.0 && plan.estimated_success_rate <= 1.0);
    assert_eq!(plan.allocations.len(), 2);
}
