//! Task dependency graph.
//!
//! The `TaskDag` represents a run's tasks as a directed graph in which an
//! edge A -> B means "B depends on A". It is built once per run from the
//! tasks' dependency lists and rejected outright if the input is cyclic or
//! references unknown task ids. During execution it answers the scheduling
//! queries: which tasks are ready, which are finished, and which can never
//! run because something upstream failed.

use crate::core::task::{Task, TaskId, TaskStatus};
use crate::error::{Error, Result};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// The task dependency graph for one run.
#[derive(Debug)]
pub struct TaskDag {
    /// The underlying directed graph. Edges point from dependency to
    /// dependent.
    graph: DiGraph<Task, ()>,
    /// Index mapping from TaskId to NodeIndex for fast lookups.
    task_index: HashMap<TaskId, NodeIndex>,
}

impl TaskDag {
    /// Build the graph from a run's task set.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a dependency id does not name a task
    /// in the same set, or a cycle error if the dependencies are cyclic.
    /// No partial graph is produced in either case.
    pub fn from_tasks(tasks: Vec<Task>) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut task_index = HashMap::new();

        for task in &tasks {
            if task_index.contains_key(&task.id) {
                return Err(Error::Validation(format!(
                    "Duplicate task id {} in run",
                    task.id
                )));
            }
            let deps = task.dependencies.clone();
            let id = task.id;
            let index = graph.add_node(task.clone());
            task_index.insert(id, (index, deps));
        }

        for (id, (index, deps)) in &task_index {
            for dep in deps {
                let (dep_index, _) = task_index.get(dep).ok_or_else(|| Error::Validation(
                    format!("Task {} depends on unknown task {}", id, dep),
                ))?;
                graph.add_edge(*dep_index, *index, ());
            }
        }

        if is_cyclic_directed(&graph) {
            let mut agents: Vec<String> = tasks.iter().map(|t| t.agent_id.to_string()).collect();
            agents.sort();
            return Err(Error::DependencyCycle { agents });
        }

        Ok(Self {
            graph,
            task_index: task_index.into_iter().map(|(k, (i, _))| (k, i)).collect(),
        })
    }

    /// Get a reference to a task by its ID.
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.task_index
            .get(id)
            .and_then(|&index| self.graph.node_weight(index))
    }

    /// Get a mutable reference to a task by its ID.
    pub fn get_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        if let Some(&index) = self.task_index.get(id) {
            self.graph.node_weight_mut(index)
        } else {
            None
        }
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.task_index.contains_key(id)
    }

    /// Number of tasks in the graph.
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of dependency edges.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All tasks, in arbitrary graph order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.graph.node_weights()
    }

    /// Pending tasks whose dependencies are all in the completed set.
    ///
    /// Failed dependencies never satisfy a task, so dependents of a failed
    /// task simply never show up here.
    pub fn ready_tasks<'a>(&'a self, completed: &HashSet<TaskId>) -> Vec<&'a Task> {
        self.graph
            .node_indices()
            .filter_map(|index| {
                let task = self.graph.node_weight(index)?;
                if task.status != TaskStatus::Pending {
                    return None;
                }
                let deps_satisfied = self
                    .graph
                    .neighbors_directed(index, petgraph::Direction::Incoming)
                    .all(|dep| {
                        self.graph
                            .node_weight(dep)
                            .map(|t| completed.contains(&t.id))
                            .unwrap_or(false)
                    });
                deps_satisfied.then_some(task)
            })
            .collect()
    }

    /// Pending tasks that can never run because a (transitive) dependency
    /// failed.
    pub fn blocked_tasks(&self) -> Vec<&Task> {
        let failed: HashSet<TaskId> = self
            .tasks()
            .filter(|t| t.status == TaskStatus::Failed)
            .map(|t| t.id)
            .collect();

        let mut doomed: HashSet<TaskId> = HashSet::new();
        for id in &failed {
            self.mark_downstream(id, &mut doomed);
        }

        self.tasks()
            .filter(|t| t.status == TaskStatus::Pending && doomed.contains(&t.id))
            .collect()
    }

    fn mark_downstream(&self, id: &TaskId, out: &mut HashSet<TaskId>) {
        let Some(&index) = self.task_index.get(id) else {
            return;
        };
        for next in self
            .graph
            .neighbors_directed(index, petgraph::Direction::Outgoing)
        {
            if let Some(task) = self.graph.node_weight(next) {
                if out.insert(task.id) {
                    self.mark_downstream(&task.id, out);
                }
            }
        }
    }

    /// Whether every task is in a terminal state.
    pub fn all_finished(&self) -> bool {
        self.tasks().all(|t| t.is_finished())
    }

    /// Count tasks currently in the given status.
    pub fn count_status(&self, status: TaskStatus) -> usize {
        self.tasks().filter(|t| t.status == status).count()
    }
}
