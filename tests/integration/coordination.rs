//! Run-loop behavior: failure gating, concurrency caps, status
//! consistency, and reporting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use foreman::core::{AgentStatus, Task};
use foreman::orchestration::{Executor, ExecutorReport, RunEvent, SimulatedExecutor};

use crate::fixtures::{agent, chain, Harness};

/// Scenario D: task X fails, task Y depends on X. After the run Y is still
/// pending, the failed count is 1, and the completed count excludes Y.
#[tokio::test]
async fn failed_task_blocks_dependents_forever() {
    let mut harness = Harness::new(
        vec![agent("x"), agent("y").with_dependencies(&["x"])],
        Arc::new(SimulatedExecutor::new(0).with_failing(&["x"])),
        3,
    );
    let outcome = harness.coordinator.run(&mut harness.finished_rx).await;

    assert!(!outcome.success);
    let status = harness.coordinator.status();
    assert_eq!(status.failed, 1);
    assert_eq!(status.completed, 0);
    assert_eq!(status.pending, 1);
    assert!(status.is_consistent());

    // The report names the blocked task.
    assert!(outcome.report.contains("Permanently blocked"));
    assert!(outcome.report.contains("y"));
}

/// Scenario E: concurrency cap 2, five independent tasks. At no observed
/// instant are more than two tasks in progress.
#[tokio::test]
async fn concurrency_cap_is_never_exceeded() {
    struct CountingExecutor {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Executor for CountingExecutor {
        async fn execute(&self, _task: &Task) -> ExecutorReport {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(15)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            ExecutorReport::success(500)
        }
    }

    let executor = Arc::new(CountingExecutor {
        current: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let mut harness = Harness::new(
        vec![agent("a"), agent("b"), agent("c"), agent("d"), agent("e")],
        executor.clone(),
        2,
    );
    let outcome = harness.coordinator.run(&mut harness.finished_rx).await;

    assert!(outcome.success);
    assert_eq!(outcome.metrics.completed_tasks, 5);
    assert!(executor.peak.load(Ordering::SeqCst) <= 2);
}

/// A diamond of dependencies executes every task exactly once, in
/// dependency order.
#[tokio::test]
async fn diamond_executes_in_dependency_order() {
    let mut harness = Harness::instant(
        vec![
            agent("root"),
            agent("left").with_dependencies(&["root"]),
            agent("right").with_dependencies(&["root"]),
            agent("join").with_dependencies(&["left", "right"]),
        ],
        4,
    );
    let outcome = harness.coordinator.run(&mut harness.finished_rx).await;
    assert!(outcome.success);

    let mut started = Vec::new();
    while let Ok(event) = harness.events_rx.try_recv() {
        if let RunEvent::TaskStarted { agent_id, .. } = event {
            started.push(agent_id.to_string());
        }
    }
    assert_eq!(started.len(), 4);
    assert_eq!(started[0], "root");
    assert_eq!(started[3], "join");
}

/// The run terminates with a report even when everything fails.
#[tokio::test]
async fn total_failure_still_produces_a_report() {
    let mut harness = Harness::new(
        chain(&["a", "b", "c"]),
        Arc::new(SimulatedExecutor::new(0).with_failing(&["a"])),
        2,
    );
    let outcome = harness.coordinator.run(&mut harness.finished_rx).await;

    assert!(!outcome.success);
    assert_eq!(outcome.metrics.failed_tasks, 1);
    assert!(outcome.report.contains("Failed tasks:"));
    assert!(outcome.report.contains("Execution order:"));

    // b and c remain pending behind the failure.
    let status = harness.coordinator.status();
    assert_eq!(status.pending, 2);
    assert!(status.is_consistent());
}

/// Cancelling before the run marks all pending tasks failed-not-started.
#[tokio::test]
async fn cancel_fails_pending_without_starting_them() {
    let mut harness = Harness::instant(chain(&["a", "b", "c"]), 1);
    harness.coordinator.cancel_token().cancel();
    let outcome = harness.coordinator.run(&mut harness.finished_rx).await;

    assert!(!outcome.success);
    let status = harness.coordinator.status();
    assert_eq!(status.pending, 0);
    assert_eq!(status.failed, 3);
    assert!(status.is_consistent());
    // None of them accrued execution time.
    assert_eq!(outcome.metrics.total_time, 0.0);
}

/// Completed and failed agents end in the matching registry status, and the
/// workload view reflects the run.
#[tokio::test]
async fn agent_statuses_and_workload_track_outcomes() {
    let mut harness = Harness::new(
        vec![agent("good"), agent("bad")],
        Arc::new(SimulatedExecutor::new(0).with_failing(&["bad"])),
        2,
    );
    harness.coordinator.run(&mut harness.finished_rx).await;

    let workload = harness.coordinator.agent_workload();
    let good = workload.get(&"good".into()).unwrap();
    assert_eq!(good.completed_tasks, 1);
    assert!(good.efficiency > 0.99);
    let bad = workload.get(&"bad".into()).unwrap();
    assert_eq!(bad.completed_tasks, 0);
    assert_eq!(bad.total_tasks, 1);

    assert_eq!(
        harness.coordinator.status().completed + harness.coordinator.status().failed,
        2
    );
}

/// Out-of-band `start`/`complete` calls in the wrong state are rejected
/// without corrupting counters.
#[tokio::test]
async fn wrong_state_calls_are_rejected() {
    let mut harness = Harness::instant(vec![agent("a")], 1);
    let id = harness.plan.execution_order[0];

    assert!(!harness.coordinator.complete(&id, ExecutorReport::success(1)));
    assert!(harness.coordinator.start(&id));
    assert!(!harness.coordinator.start(&id));

    let finished = harness.finished_rx.recv().await.unwrap();
    assert!(harness.coordinator.complete(&finished.task_id, finished.report));
    assert!(!harness.coordinator.complete(&id, ExecutorReport::success(1)));

    let status = harness.coordinator.status();
    assert_eq!(status.completed, 1);
    assert!(status.is_consistent());
}

/// Agents with dependencies start out Waiting; independent agents Idle.
#[tokio::test]
async fn initial_agent_statuses() {
    let harness = Harness::instant(chain(&["first", "second"]), 2);
    let registry_status = |id: &str| {
        harness
            .coordinator
            .status_of_agent(&id.into())
            .expect("agent exists")
    };
    assert_eq!(registry_status("first"), AgentStatus::Idle);
    assert_eq!(registry_status("second"), AgentStatus::Waiting);
}
