//! End-of-run report rendering.
//!
//! The report is free-form text but always enumerates every run metric,
//! the execution order with per-task allocations, the per-agent workload,
//! failed tasks, and tasks left permanently blocked behind failures.

use crate::allocation::AllocationStrategy;
use crate::core::agent::{AgentId, AgentRegistry};
use crate::core::dag::TaskDag;
use crate::core::task::TaskStatus;
use crate::metrics::{AgentWorkload, RunMetrics};
use crate::orchestration::planner::ExecutionPlan;
use std::collections::HashMap;
use std::fmt::Write;

/// Render the end-of-run report.
pub fn render(
    plan: &ExecutionPlan,
    dag: &TaskDag,
    metrics: &RunMetrics,
    workload: &HashMap<AgentId, AgentWorkload>,
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Execution Report");
    let _ = writeln!(out, "================");
    let _ = writeln!(out);

    let _ = writeln!(out, "Overall:");
    let _ = writeln!(out, "  Total tasks:     {}", metrics.total_tasks);
    let _ = writeln!(out, "  Completed:       {}", metrics.completed_tasks);
    let _ = writeln!(out, "  Failed:          {}", metrics.failed_tasks);
    let _ = writeln!(out, "  Efficiency:      {:.1}%", metrics.efficiency * 100.0);
    let _ = writeln!(out, "  Total time:      {:.1} min", metrics.total_time);
    let _ = writeln!(out, "  Total cost:      ${:.4}", metrics.total_cost);
    if let Some(elapsed) = metrics.elapsed_minutes() {
        let _ = writeln!(out, "  Wall clock:      {:.2} min", elapsed);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Execution order:");
    for (index, task_id) in plan.execution_order.iter().enumerate() {
        let Some(task) = dag.get(task_id) else { continue };
        let _ = writeln!(
            out,
            "  {}. {} [{}] agent={} resource={} {}",
            index + 1,
            task.name,
            task.priority,
            task.agent_id,
            task.resource.name,
            task.status,
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Agent workload:");
    let mut agents: Vec<_> = workload.iter().collect();
    agents.sort_by(|a, b| a.0.cmp(b.0));
    for (agent_id, load) in agents {
        let _ = writeln!(
            out,
            "  {}: {}/{} tasks completed, {:.1} min busy, {:.1}% efficiency",
            agent_id,
            load.completed_tasks,
            load.total_tasks,
            load.utilization,
            load.efficiency * 100.0,
        );
    }

    let failed: Vec<_> = dag
        .tasks()
        .filter(|t| t.status == TaskStatus::Failed)
        .collect();
    if !failed.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failed tasks:");
        for task in failed {
            let _ = writeln!(out, "  {} (agent {})", task.name, task.agent_id);
        }
    }

    let blocked = dag.blocked_tasks();
    if !blocked.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Permanently blocked (failed dependency, never started):");
        for task in blocked {
            let _ = writeln!(out, "  {} (agent {})", task.name, task.agent_id);
        }
    }

    out
}

/// Render a plan preview before execution.
pub fn render_plan(plan: &ExecutionPlan, dag: &TaskDag) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Execution Plan");
    let _ = writeln!(out, "==============");
    let _ = writeln!(out);
    for (index, task_id) in plan.execution_order.iter().enumerate() {
        let Some(task) = dag.get(task_id) else { continue };
        let _ = writeln!(out, "{}. {} ({})", index + 1, task.name, task.agent_id);
        let _ = writeln!(
            out,
            "   priority={} complexity={} resource={} est={} min",
            task.priority, task.complexity, task.resource.name, task.estimated_duration,
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Estimated duration: {} min", plan.estimated_duration);
    let _ = writeln!(out, "Estimated cost:     ${:.4}", plan.estimated_cost);
    let _ = writeln!(
        out,
        "Estimated success:  {:.0}%",
        plan.estimated_success_rate * 100.0
    );

    out
}

/// Render same-tier cost-optimization hints for a plan. Empty when every
/// allocation already scores best within its tier.
pub fn render_cost_hints(
    plan: &ExecutionPlan,
    dag: &TaskDag,
    registry: &AgentRegistry,
    strategy: &AllocationStrategy,
) -> String {
    let mut out = String::new();

    for task_id in &plan.execution_order {
        let Some(task) = dag.get(task_id) else { continue };
        let Some(agent) = registry.get(&task.agent_id) else {
            continue;
        };
        let optimization = strategy.cost_optimize(task.complexity, agent.required_tier, &task.resource);
        if optimization.recommended.name == task.resource.name {
            continue;
        }
        if out.is_empty() {
            let _ = writeln!(out, "Cost hints (same tier, better score):");
        }
        let _ = writeln!(
            out,
            "  {}: {} -> {} (saves ${:.4})",
            task.name, task.resource.name, optimization.recommended.name, optimization.cost_savings,
        );
    }

    out
}
