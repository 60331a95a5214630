//! Execution coordinator.
//!
//! The coordinator is the single writer for a run: it owns the task graph,
//! the agent registry, and the run metrics, and it is the only component
//! that transitions task or agent state. Executors run concurrently under
//! the pool's cap and report back over a channel; everything else reads
//! snapshots.
//!
//! The run loop alternates between filling free executor slots from the
//! plan's next-available query and waiting for an in-flight task to finish.
//! A hard round ceiling guarantees termination; cancellation marks pending
//! work failed and lets in-flight work finish.

use crate::core::agent::{AgentId, AgentRegistry, AgentStatus};
use crate::core::dag::TaskDag;
use crate::core::task::{Task, TaskId, TaskStatus};
use crate::error::Result;
use crate::knowledge::{KnowledgeStore, OutcomeMetrics, StrategyPayload};
use crate::metrics::{AgentWorkload, RunMetrics, RunStatus};
use crate::orchestration::executor::{Executor, ExecutorPool, ExecutorReport, TaskFinished};
use crate::orchestration::planner::ExecutionPlan;
use crate::report;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Events emitted for task lifecycle changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    TaskStarted { task_id: TaskId, agent_id: AgentId },
    TaskCompleted { task_id: TaskId },
    TaskFailed { task_id: TaskId },
    RunFinished,
}

/// Tunables for one run.
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Maximum tasks in progress at once.
    pub max_concurrent: usize,
    /// Hard ceiling on run-loop rounds.
    pub max_rounds: u32,
    /// How long one round waits for a finish event before re-checking.
    pub round_timeout: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            max_rounds: 50,
            round_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of a finished (or partially finished) run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// True when every task completed.
    pub success: bool,
    pub metrics: RunMetrics,
    /// Human-readable end-of-run report.
    pub report: String,
}

/// Drives one run to completion.
pub struct Coordinator {
    dag: TaskDag,
    registry: AgentRegistry,
    plan: ExecutionPlan,
    completed: HashSet<TaskId>,
    pool: ExecutorPool,
    knowledge: KnowledgeStore,
    metrics: RunMetrics,
    options: CoordinatorOptions,
    cancel: CancellationToken,
    event_tx: mpsc::Sender<RunEvent>,
}

impl Coordinator {
    /// Build a coordinator for a planned task set.
    ///
    /// Returns the coordinator plus the receivers for executor-finish and
    /// lifecycle events. The finish receiver must be handed back to
    /// [`Coordinator::run`].
    pub fn new(
        tasks: Vec<Task>,
        plan: ExecutionPlan,
        mut registry: AgentRegistry,
        knowledge: KnowledgeStore,
        executor: Arc<dyn Executor>,
        options: CoordinatorOptions,
    ) -> Result<(Self, mpsc::Receiver<TaskFinished>, mpsc::Receiver<RunEvent>)> {
        let total = tasks.len();

        // Agents whose tasks wait on something start out Waiting.
        for task in &tasks {
            let status = if task.dependencies.is_empty() {
                AgentStatus::Idle
            } else {
                AgentStatus::Waiting
            };
            registry.set_status(&task.agent_id, status)?;
        }

        let dag = TaskDag::from_tasks(tasks)?;
        let (pool, finished_rx) = ExecutorPool::new(executor, options.max_concurrent);
        let (event_tx, event_rx) = mpsc::channel(256);

        Ok((
            Self {
                dag,
                registry,
                plan,
                completed: HashSet::new(),
                pool,
                knowledge,
                metrics: RunMetrics::new(total),
                options,
                cancel: CancellationToken::new(),
                event_tx,
            },
            finished_rx,
            event_rx,
        ))
    }

    /// Token that cancels this run when triggered.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    /// Current registry status of an agent.
    pub fn status_of_agent(&self, agent_id: &AgentId) -> Option<AgentStatus> {
        self.registry.get(agent_id).map(|a| a.status)
    }

    /// Start a task: dispatch it to the executor pool and flip its state.
    ///
    /// Returns false, leaving all state untouched, when the task is
    /// unknown, not pending, has unmet dependencies, or the pool is at its
    /// cap. At-cap starts are simply retried by the run loop once a slot
    /// frees.
    pub fn start(&mut self, task_id: &TaskId) -> bool {
        let Some(task) = self.dag.get_mut(task_id) else {
            warn!(task = %task_id, "start rejected: unknown task");
            return false;
        };
        if task.status != TaskStatus::Pending {
            warn!(task = %task_id, status = %task.status, "start rejected: not pending");
            return false;
        }
        if !task.dependencies.iter().all(|d| self.completed.contains(d)) {
            warn!(task = %task_id, "start rejected: unmet dependencies");
            return false;
        }
        if !self.pool.has_capacity() {
            debug!(task = %task_id, "start deferred: at concurrency cap");
            return false;
        }

        let snapshot = task.clone();
        if self.pool.dispatch(&snapshot).is_err() {
            return false;
        }

        task.start();
        let agent_id = task.agent_id.clone();
        let _ = self.registry.set_status(&agent_id, AgentStatus::Working);

        info!(
            task = %task_id,
            agent = %agent_id,
            resource = %snapshot.resource.name,
            minutes = snapshot.estimated_duration,
            "task started"
        );
        let _ = self.event_tx.try_send(RunEvent::TaskStarted {
            task_id: *task_id,
            agent_id,
        });
        true
    }

    /// Fold an executor report into the run.
    ///
    /// Returns false when the task is unknown or not in progress; shared
    /// state is untouched in that case. Success and partial outcomes join
    /// the completed set; failures only bump the failed counter, so
    /// dependents of a failed task stay pending forever.
    pub fn complete(&mut self, task_id: &TaskId, report: ExecutorReport) -> bool {
        let Some(task) = self.dag.get_mut(task_id) else {
            warn!(task = %task_id, "complete rejected: unknown task");
            return false;
        };
        if task.status != TaskStatus::InProgress {
            warn!(task = %task_id, status = %task.status, "complete rejected: not in progress");
            return false;
        }

        let productive = report.outcome.is_productive();
        if productive {
            task.complete();
        } else {
            task.fail();
        }
        let task = task.clone();
        self.pool.release(task_id);

        if productive {
            self.completed.insert(*task_id);
            self.metrics.record_completion(&task);
            let _ = self
                .registry
                .set_status(&task.agent_id, AgentStatus::Completed);
            info!(task = %task_id, agent = %task.agent_id, "task completed");
            let _ = self
                .event_tx
                .try_send(RunEvent::TaskCompleted { task_id: *task_id });
        } else {
            self.metrics.record_failure(&task);
            let _ = self.registry.set_status(&task.agent_id, AgentStatus::Failed);
            warn!(task = %task_id, agent = %task.agent_id, "task failed");
            let _ = self
                .event_tx
                .try_send(RunEvent::TaskFailed { task_id: *task_id });
        }

        let minutes = task.actual_duration().unwrap_or(0.0);
        self.knowledge.record_outcome(
            &task.category,
            task.complexity,
            task.priority,
            StrategyPayload::new(&task.resource.name),
            report.outcome,
            OutcomeMetrics {
                minutes,
                units_consumed: report.units_consumed,
            },
        );
        self.knowledge
            .update_agent_profile(&task.agent_id, minutes, report.outcome);
        true
    }

    /// Point-in-time run status. The counters always partition the task
    /// set.
    pub fn status(&self) -> RunStatus {
        let estimated_time_remaining = self
            .dag
            .tasks()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| t.estimated_duration)
            .sum();
        RunStatus {
            total: self.dag.task_count(),
            completed: self.dag.count_status(TaskStatus::Completed),
            in_progress: self.dag.count_status(TaskStatus::InProgress),
            pending: self.dag.count_status(TaskStatus::Pending),
            failed: self.dag.count_status(TaskStatus::Failed),
            efficiency: self.metrics.efficiency,
            estimated_time_remaining,
        }
    }

    /// Per-agent workload distribution.
    pub fn agent_workload(&self) -> HashMap<AgentId, AgentWorkload> {
        let mut workload: HashMap<AgentId, AgentWorkload> = HashMap::new();
        for task in self.dag.tasks() {
            let entry = workload.entry(task.agent_id.clone()).or_default();
            entry.total_tasks += 1;
            match task.status {
                TaskStatus::Completed => entry.completed_tasks += 1,
                TaskStatus::InProgress => entry.in_progress_tasks += 1,
                _ => {}
            }
        }
        for (agent_id, entry) in workload.iter_mut() {
            entry.utilization = self
                .metrics
                .agent_utilization
                .get(agent_id)
                .copied()
                .unwrap_or(0.0);
            if entry.total_tasks > 0 {
                entry.efficiency = entry.completed_tasks as f64 / entry.total_tasks as f64;
            }
        }
        workload
    }

    /// Drive the run to completion.
    ///
    /// Fills free slots, waits for finish events, and repeats until no
    /// pending or in-progress work remains. If the round ceiling is hit
    /// first, the run terminates reporting partial completion.
    pub async fn run(&mut self, finished_rx: &mut mpsc::Receiver<TaskFinished>) -> RunOutcome {
        self.metrics.mark_started();
        let cancel = self.cancel.clone();

        for round in 1..=self.options.max_rounds {
            if cancel.is_cancelled() {
                self.cancel_pending();
                self.drain_in_flight(finished_rx).await;
                break;
            }

            // Fill available slots in plan order.
            while self.pool.has_capacity() {
                let Some(next) = self.plan.next_available(&self.dag, &self.completed) else {
                    break;
                };
                if !self.start(&next) {
                    break;
                }
            }

            let status = self.status();
            debug!(
                round,
                completed = status.completed,
                in_progress = status.in_progress,
                pending = status.pending,
                failed = status.failed,
                "run round"
            );

            if status.in_progress == 0 {
                if status.pending == 0 {
                    break;
                }
                // Nothing running and nothing dispatchable: the rest is
                // permanently blocked behind failures.
                warn!(pending = status.pending, "no runnable tasks remain");
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    self.cancel_pending();
                    self.drain_in_flight(finished_rx).await;
                    break;
                }
                result = tokio::time::timeout(self.options.round_timeout, finished_rx.recv()) => {
                    match result {
                        Ok(Some(finished)) => {
                            self.complete(&finished.task_id, finished.report);
                            // Fold in anything else that finished meanwhile.
                            while let Ok(extra) = finished_rx.try_recv() {
                                self.complete(&extra.task_id, extra.report);
                            }
                        }
                        Ok(None) => break,
                        Err(_) => {
                            warn!(round, "round timed out waiting for executor");
                        }
                    }
                }
            }

            if round == self.options.max_rounds {
                warn!(max_rounds = self.options.max_rounds, "round ceiling reached");
            }
        }

        self.metrics.mark_finished();
        let _ = self.event_tx.try_send(RunEvent::RunFinished);

        let status = self.status();
        let report = report::render(&self.plan, &self.dag, &self.metrics, &self.agent_workload());
        RunOutcome {
            success: status.completed == status.total,
            metrics: self.metrics.clone(),
            report,
        }
    }

    /// Mark every pending task failed-not-started. In-progress tasks are
    /// left to finish.
    fn cancel_pending(&mut self) {
        let pending: Vec<TaskId> = self
            .dag
            .tasks()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| t.id)
            .collect();
        info!(count = pending.len(), "cancelling pending tasks");
        for task_id in pending {
            if let Some(task) = self.dag.get_mut(&task_id) {
                task.fail();
                let task = task.clone();
                self.metrics.record_failure(&task);
                let _ = self.registry.set_status(&task.agent_id, AgentStatus::Failed);
                let _ = self.event_tx.try_send(RunEvent::TaskFailed { task_id });
            }
        }
    }

    /// Let in-flight tasks finish and fold in their reports.
    async fn drain_in_flight(&mut self, finished_rx: &mut mpsc::Receiver<TaskFinished>) {
        self.pool.drain().await;
        while let Ok(finished) = finished_rx.try_recv() {
            self.complete(&finished.task_id, finished.report);
        }
    }
}
