//! Executor collaborator boundary and the capacity-tracked pool.
//!
//! The coordinator never performs work itself; it hands tasks to an
//! [`Executor`] implementation and listens for outcome events on a channel.
//! `ExecutorPool` owns the in-flight futures, enforces the concurrency cap,
//! and translates completions into [`TaskFinished`] events.
//!
//! `SimulatedExecutor` is the default implementation used by the binary and
//! the test suites: it sleeps a scaled-down version of the task's estimated
//! duration and reports a configurable outcome.

use crate::core::agent::AgentId;
use crate::core::task::{Task, TaskId};
use crate::error::{Error, Result};
use crate::knowledge::Outcome;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What an executor reports back for one task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutorReport {
    pub outcome: Outcome,
    /// Work units the executor consumed.
    pub units_consumed: u32,
}

impl ExecutorReport {
    pub fn success(units_consumed: u32) -> Self {
        Self {
            outcome: Outcome::Success,
            units_consumed,
        }
    }

    pub fn failure() -> Self {
        Self {
            outcome: Outcome::Failure,
            units_consumed: 0,
        }
    }
}

/// Performs the actual work for a task.
///
/// Implementations live outside this crate's core; the coordinator only
/// needs the handle. An executor must not panic on failure; it reports a
/// failure outcome instead.
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    async fn execute(&self, task: &Task) -> ExecutorReport;
}

/// Event emitted when an in-flight task finishes.
#[derive(Debug, Clone)]
pub struct TaskFinished {
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub report: ExecutorReport,
}

/// Owns in-flight executor futures and enforces the concurrency cap.
pub struct ExecutorPool {
    executor: Arc<dyn Executor>,
    in_flight: HashMap<TaskId, JoinHandle<()>>,
    max_concurrent: usize,
    finished_tx: mpsc::Sender<TaskFinished>,
}

impl ExecutorPool {
    /// Create a pool. Returns the pool and the receiver for finish events.
    pub fn new(
        executor: Arc<dyn Executor>,
        max_concurrent: usize,
    ) -> (Self, mpsc::Receiver<TaskFinished>) {
        let (finished_tx, finished_rx) = mpsc::channel(256);
        (
            Self {
                executor,
                in_flight: HashMap::new(),
                max_concurrent,
                finished_tx,
            },
            finished_rx,
        )
    }

    /// Number of tasks currently executing.
    pub fn active_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn has_capacity(&self) -> bool {
        self.active_count() < self.max_concurrent
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Ids of tasks currently executing.
    pub fn active_tasks(&self) -> HashSet<TaskId> {
        self.in_flight.keys().copied().collect()
    }

    /// Spawn the executor for a task.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is at capacity.
    pub fn dispatch(&mut self, task: &Task) -> Result<()> {
        if !self.has_capacity() {
            return Err(Error::PoolFull {
                max: self.max_concurrent,
            });
        }

        let executor = Arc::clone(&self.executor);
        let finished_tx = self.finished_tx.clone();
        let task = task.clone();
        let task_id = task.id;

        let handle = tokio::spawn(async move {
            let report = executor.execute(&task).await;
            let _ = finished_tx
                .send(TaskFinished {
                    task_id: task.id,
                    agent_id: task.agent_id.clone(),
                    report,
                })
                .await;
        });

        self.in_flight.insert(task_id, handle);
        Ok(())
    }

    /// Release a finished task's slot.
    pub fn release(&mut self, task_id: &TaskId) {
        self.in_flight.remove(task_id);
    }

    /// Wait for every in-flight task to run to completion.
    ///
    /// Used on shutdown: cancellation is coarse, so in-progress work is
    /// allowed to finish rather than being interrupted mid-task.
    pub async fn drain(&mut self) {
        let handles: Vec<JoinHandle<()>> = self.in_flight.drain().map(|(_, h)| h).collect();
        futures::future::join_all(handles).await;
    }
}

/// Executor that simulates work by sleeping.
///
/// One estimated minute becomes `ms_per_minute` milliseconds of sleep. The
/// agents listed in `failing` report failure; everyone else succeeds and
/// reports the task's work-unit estimate as consumed.
pub struct SimulatedExecutor {
    ms_per_minute: u64,
    failing: HashSet<AgentId>,
}

impl SimulatedExecutor {
    pub fn new(ms_per_minute: u64) -> Self {
        Self {
            ms_per_minute,
            failing: HashSet::new(),
        }
    }

    /// Make the given agents' tasks fail.
    pub fn with_failing(mut self, agents: &[&str]) -> Self {
        self.failing = agents.iter().map(|a| AgentId::new(a)).collect();
        self
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        // One millisecond per estimated minute keeps demo runs snappy.
        Self::new(1)
    }
}

#[async_trait]
impl Executor for SimulatedExecutor {
    async fn execute(&self, task: &Task) -> ExecutorReport {
        let delay = Duration::from_millis(u64::from(task.estimated_duration) * self.ms_per_minute);
        tokio::time::sleep(delay).await;

        if self.failing.contains(&task.agent_id) {
            ExecutorReport::failure()
        } else {
            ExecutorReport::success(task.estimated_units())
        }
    }
}
