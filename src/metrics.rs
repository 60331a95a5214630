//! Run metrics and status snapshots.
//!
//! `RunMetrics` is the aggregate ledger for one execution run. It is owned
//! and mutated only by the execution coordinator; everything handed out to
//! callers is a cloned snapshot.

use crate::core::agent::AgentId;
use crate::core::task::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregate counters for a single execution run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Number of tasks in the run.
    pub total_tasks: usize,
    /// Tasks that finished successfully (including partial outcomes).
    pub completed_tasks: usize,
    /// Tasks that failed, including cancelled-before-start tasks.
    pub failed_tasks: usize,
    /// Sum of actual task durations, in minutes.
    pub total_time: f64,
    /// Accumulated cost across completed tasks.
    pub total_cost: f64,
    /// Minutes each agent spent busy.
    pub agent_utilization: HashMap<AgentId, f64>,
    /// completed / total, in [0, 1].
    pub efficiency: f64,
    /// When the run started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run finished.
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunMetrics {
    pub fn new(total_tasks: usize) -> Self {
        Self {
            total_tasks,
            ..Default::default()
        }
    }

    /// Record a successful completion: accrue cost from the task's
    /// work-unit estimate, credit the agent's utilization, recompute
    /// efficiency.
    pub fn record_completion(&mut self, task: &Task) {
        self.completed_tasks += 1;
        let duration = task.actual_duration().unwrap_or(0.0);
        self.total_time += duration;
        self.total_cost += task.estimated_cost();
        *self
            .agent_utilization
            .entry(task.agent_id.clone())
            .or_insert(0.0) += duration;
        self.recompute_efficiency();
    }

    /// Record a failure. The completed count is untouched so dependents of
    /// the failed task remain blocked.
    pub fn record_failure(&mut self, task: &Task) {
        self.failed_tasks += 1;
        if let Some(duration) = task.actual_duration() {
            self.total_time += duration;
            *self
                .agent_utilization
                .entry(task.agent_id.clone())
                .or_insert(0.0) += duration;
        }
        self.recompute_efficiency();
    }

    fn recompute_efficiency(&mut self) {
        if self.total_tasks > 0 {
            self.efficiency = self.completed_tasks as f64 / self.total_tasks as f64;
        }
    }

    pub fn mark_started(&mut self) {
        self.started_at = Some(Utc::now());
    }

    pub fn mark_finished(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock minutes between run start and finish, if both are set.
    pub fn elapsed_minutes(&self) -> Option<f64> {
        let start = self.started_at?;
        let end = self.finished_at?;
        Some((end - start).num_milliseconds() as f64 / 60_000.0)
    }
}

/// Point-in-time view of a run's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
    pub failed: usize,
    pub efficiency: f64,
    /// Sum of pending tasks' estimated durations, in minutes.
    pub estimated_time_remaining: u32,
}

impl RunStatus {
    /// The counters always partition the task set.
    pub fn is_consistent(&self) -> bool {
        self.completed + self.in_progress + self.pending + self.failed == self.total
    }
}

/// Per-agent workload view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentWorkload {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub in_progress_tasks: usize,
    /// Minutes spent busy.
    pub utilization: f64,
    /// completed / total for this agent, in [0, 1].
    pub efficiency: f64,
}
