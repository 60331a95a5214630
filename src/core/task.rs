//! Task data model.
//!
//! A task is one schedulable unit of work, derived 1:1 from an agent for a
//! given run. It carries the resource configuration chosen for it, its
//! dependency ids, and lifecycle timestamps. Status and timestamps are the
//! only mutable fields, and only the execution coordinator touches them.

use crate::core::agent::{AgentId, Priority};
use crate::core::catalog::ResourceConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a task within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Create a new unique task identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 characters of the UUID, for human-readable output.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Complexity classification of a task.
///
/// Complexity drives both resource selection and the work-unit estimate
/// used for cost accounting.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    #[default]
    Moderate,
    Complex,
    Expert,
}

impl Complexity {
    /// Estimated work units a task of this complexity consumes.
    pub fn work_units(&self) -> u32 {
        match self {
            Complexity::Simple => 2000,
            Complexity::Moderate => 4000,
            Complexity::Complex => 6000,
            Complexity::Expert => 8000,
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Complexity::Simple => write!(f, "simple"),
            Complexity::Moderate => write!(f, "moderate"),
            Complexity::Complex => write!(f, "complex"),
            Complexity::Expert => write!(f, "expert"),
        }
    }
}

/// Task status in its lifecycle.
///
/// pending -> in-progress -> {completed, failed}, terminal. A task never
/// re-enters pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in-progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A single schedulable unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for this task.
    pub id: TaskId,
    /// Human-readable name.
    pub name: String,
    /// Free-form classification used as the knowledge-lookup key.
    pub category: String,
    /// Priority class, inherited from the submission.
    pub priority: Priority,
    /// Complexity classification.
    pub complexity: Complexity,
    /// The agent this task is assigned to.
    pub agent_id: AgentId,
    /// The resource configuration chosen for this task.
    pub resource: ResourceConfig,
    /// Tasks that must complete before this one can start.
    pub dependencies: Vec<TaskId>,
    /// Estimated duration in minutes.
    pub estimated_duration: u32,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task started execution.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task finished (success or failure).
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        category: &str,
        priority: Priority,
        complexity: Complexity,
        agent_id: AgentId,
        resource: ResourceConfig,
        dependencies: Vec<TaskId>,
        estimated_duration: u32,
    ) -> Self {
        Self {
            id: TaskId::new(),
            name: name.to_string(),
            category: category.to_string(),
            priority,
            complexity,
            agent_id,
            resource,
            dependencies,
            estimated_duration,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Transition to in-progress and stamp the start time.
    pub fn start(&mut self) {
        self.status = TaskStatus::InProgress;
        self.started_at = Some(Utc::now());
    }

    /// Transition to completed and stamp the completion time.
    pub fn complete(&mut self) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Transition to failed and stamp the completion time.
    pub fn fail(&mut self) {
        self.status = TaskStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    /// Actual wall-clock duration in minutes, once finished.
    pub fn actual_duration(&self) -> Option<f64> {
        let start = self.started_at?;
        let end = self.completed_at?;
        Some((end - start).num_milliseconds() as f64 / 60_000.0)
    }

    /// Estimated work units this task consumes, from its complexity.
    pub fn estimated_units(&self) -> u32 {
        self.complexity.work_units()
    }

    /// Estimated cost: chosen configuration cost per unit times the
    /// complexity work-unit estimate.
    pub fn estimated_cost(&self) -> f64 {
        self.resource.cost_per_unit * f64::from(self.estimated_units())
    }

    /// Whether the task is in a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Failed)
    }
}
