//! Knowledge store round trips, degradation, and the closed learning loop.

use std::sync::Arc;

use foreman::allocation::AllocationStrategy;
use foreman::core::catalog::ResourceCatalog;
use foreman::core::{Complexity, Priority};
use foreman::error::{Error, Result};
use foreman::knowledge::{
    JsonFileBackend, KnowledgeBackend, KnowledgeSnapshot, KnowledgeStore, Outcome, OutcomeMetrics,
    StrategyPayload,
};
use foreman::orchestration::{build_plan, Coordinator, CoordinatorOptions, SimulatedExecutor};

use crate::fixtures::{agent, crew};

/// Storing a record then querying the same key returns the strategy with
/// its usage count incremented by exactly one.
#[test]
fn store_then_query_increments_usage_once() {
    let mut store = KnowledgeStore::in_memory();
    store.record_outcome(
        "ops",
        Complexity::Moderate,
        Priority::Medium,
        StrategyPayload::new("standard"),
        Outcome::Success,
        OutcomeMetrics::default(),
    );
    let before = store.summarize().top_records[0].usage_count;

    let strategy = store
        .optimal_strategy("ops", Complexity::Moderate, Priority::Medium)
        .unwrap();
    assert_eq!(strategy.resource, "standard");

    let after = store.summarize().top_records[0].usage_count;
    assert_eq!(after, before + 1);
}

/// A dead backend degrades the store to memory without surfacing errors.
#[test]
fn dead_backend_is_never_fatal() {
    struct DeadBackend;
    impl KnowledgeBackend for DeadBackend {
        fn load(&self) -> Result<Option<KnowledgeSnapshot>> {
            Err(Error::Validation("unreachable".into()))
        }
        fn save(&self, _: &KnowledgeSnapshot) -> Result<()> {
            Err(Error::Validation("unreachable".into()))
        }
        fn describe(&self) -> String {
            "dead".into()
        }
    }

    let mut store = KnowledgeStore::open(Box::new(DeadBackend));
    assert!(store.is_degraded());

    store.record_outcome(
        "ops",
        Complexity::Simple,
        Priority::Low,
        StrategyPayload::new("scout"),
        Outcome::Success,
        OutcomeMetrics::default(),
    );
    assert_eq!(store.record_count(), 1);
    assert!(store
        .optimal_strategy("ops", Complexity::Simple, Priority::Low)
        .is_some());
}

/// A run feeds outcomes back into the store: every task shape gains a
/// record and every agent a profile.
#[tokio::test]
async fn run_populates_knowledge() {
    let (registry, specs) = crew(vec![agent("a"), agent("b")]);
    let strategy = AllocationStrategy::new(ResourceCatalog::builtin());
    let mut knowledge = KnowledgeStore::in_memory();
    let (tasks, plan) = build_plan(&registry, &strategy, &mut knowledge, &specs).unwrap();

    let (mut coordinator, mut finished_rx, _events) = Coordinator::new(
        tasks,
        plan,
        registry,
        knowledge,
        Arc::new(SimulatedExecutor::new(0)),
        CoordinatorOptions::default(),
    )
    .unwrap();
    let outcome = coordinator.run(&mut finished_rx).await;
    assert!(outcome.success);

    let summary = coordinator.knowledge().summarize();
    assert!(summary.record_count >= 1);
    assert_eq!(summary.profile_count, 2);
    let profile = coordinator.knowledge().agent_profile(&"a".into()).unwrap();
    assert_eq!(profile.tasks_finished, 1);
    assert!(profile.success_rate > 0.0);
}

/// The closed loop: outcomes recorded through a persistent backend survive
/// a restart and bias the next plan's allocation.
#[tokio::test]
async fn learned_strategy_biases_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("knowledge.json");

    // First run: a simple low-priority crew completes on the advanced
    // default, teaching the store that its resource works.
    {
        let (registry, mut specs) = crew(vec![agent("worker").with_priority(Priority::Low)]);
        specs[0].complexity = Complexity::Simple;
        let strategy = AllocationStrategy::new(ResourceCatalog::builtin());
        let mut knowledge = KnowledgeStore::open(Box::new(JsonFileBackend::new(path.clone())));
        let (tasks, plan) = build_plan(&registry, &strategy, &mut knowledge, &specs).unwrap();
        assert_eq!(tasks[0].resource.name, "standard");

        let (mut coordinator, mut finished_rx, _events) = Coordinator::new(
            tasks,
            plan,
            registry,
            knowledge,
            Arc::new(SimulatedExecutor::new(0)),
            CoordinatorOptions::default(),
        )
        .unwrap();
        assert!(coordinator.run(&mut finished_rx).await.success);
    }

    // Second process: the store remembers the shape and serves it without
    // consulting the static strategy.
    {
        let (registry, mut specs) = crew(vec![agent("worker").with_priority(Priority::Low)]);
        specs[0].complexity = Complexity::Simple;
        let strategy = AllocationStrategy::new(ResourceCatalog::builtin());
        let mut knowledge = KnowledgeStore::open(Box::new(JsonFileBackend::new(path)));
        assert!(knowledge.record_count() >= 1);

        let (tasks, _plan) = build_plan(&registry, &strategy, &mut knowledge, &specs).unwrap();
        assert_eq!(tasks[0].resource.name, "standard");
    }
}
