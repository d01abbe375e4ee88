//! Task allocation, priority adjustment and duration estimation
//!
//! Everything here is a pure function of the system state so the planning
//! fallback can allocate work the same way the controller does.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::agents::AgentDescriptor;
use crate::config::ControllerConfig;
use crate::domain::{AgentKind, AgentTask, TaskPayload, TaskPriority, TaskType};
use crate::state::{AgentPerformanceMetrics, SystemState};

/// Raised priorities per agent; agents left at Medium are omitted
pub fn priority_adjustments(
    state: &SystemState,
    config: &ControllerConfig,
) -> BTreeMap<AgentKind, TaskPriority> {
    let mut raised = BTreeMap::new();
    for agent in &state.active_agents {
        let mut priority = TaskPriority::Medium;
        if let Some(accuracy) = state.performance.get(agent).and_then(|m| m.accuracy) {
            if accuracy < config.accuracy_target / 2.0 {
                priority = TaskPriority::Critical;
            } else if accuracy < config.accuracy_target {
                priority = TaskPriority::High;
            }
        }
        if *agent == AgentKind::Research && state.records.len() < config.research_case_floor {
            priority = priority.max(TaskPriority::High);
        }
        if priority > TaskPriority::Medium {
            raised.insert(*agent, priority);
        }
    }
    raised
}

/// `base × min(avg / base, cap) × priority multiplier`; the history factor is
/// skipped until the agent has timing data
pub fn estimate_duration(
    base_secs: f64,
    priority: TaskPriority,
    metrics: Option<&AgentPerformanceMetrics>,
    ratio_cap: f64,
) -> f64 {
    let history_factor = metrics
        .filter(|m| m.avg_processing_secs > 0.0 && base_secs > 0.0)
        .map(|m| (m.avg_processing_secs / base_secs).min(ratio_cap))
        .unwrap_or(1.0);
    base_secs * history_factor * priority.duration_multiplier()
}

/// Inputs shared by the controller and the fallback path
pub struct AllocationRequest<'a> {
    pub state: &'a SystemState,
    pub config: &'a ControllerConfig,
    pub descriptors: &'a BTreeMap<AgentKind, AgentDescriptor>,
    pub batch_size: usize,
    pub priorities: &'a BTreeMap<AgentKind, TaskPriority>,
    pub deadline: Option<Duration>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub tasks: Vec<AgentTask>,
    /// Task sequence to continue from next round
    pub next_sequence: u64,
}

/// Generate this round's tasks: one UrlProcessing task per backlog item up
/// to the batch size, an evaluation task once enough records exist, and a
/// legal review whenever any record exists. Only active agents get work.
pub fn allocate_tasks(req: &AllocationRequest<'_>) -> Allocation {
    let state = req.state;
    let mut sequence = state.task_sequence;
    let mut tasks = Vec::new();

    let mut build = |agent: AgentKind, task_type: TaskType, payload: TaskPayload| {
        sequence += 1;
        let priority = req.priorities.get(&agent).copied().unwrap_or_default();
        let base = req
            .descriptors
            .get(&agent)
            .map(|d| d.base_duration(task_type))
            .unwrap_or_else(|| task_type.base_duration_secs());
        let mut task = AgentTask::new(
            format!("task-{sequence}"),
            agent,
            task_type,
            priority,
            payload,
            req.now,
        );
        task.estimated_duration_secs = estimate_duration(
            base,
            priority,
            state.performance.get(&agent),
            req.config.duration_ratio_cap,
        );
        if let Some(deadline) = req.deadline {
            task = task.with_deadline(req.now + deadline);
        }
        task
    };

    let mut url_task_ids = Vec::new();
    if state.active_agents.contains(&AgentKind::Research) {
        for item in state.ledger.next_batch(req.batch_size) {
            let task = build(
                AgentKind::Research,
                TaskType::UrlProcessing,
                TaskPayload::Item { item },
            );
            url_task_ids.push(task.id.clone());
            tasks.push(task);
        }
    }

    let records = state.records.len();
    if state.active_agents.contains(&AgentKind::Evaluation)
        && records >= req.config.min_records_for_evaluation
    {
        let task = build(
            AgentKind::Evaluation,
            TaskType::PerformanceEvaluation,
            TaskPayload::Records { count: records },
        )
        .with_dependencies(url_task_ids.clone());
        tasks.push(task);
    }

    if state.active_agents.contains(&AgentKind::LegalIntelligence) && records > 0 {
        tasks.push(build(
            AgentKind::LegalIntelligence,
            TaskType::LegalIntelligence,
            TaskPayload::Records { count: records },
        ));
    }

    Allocation {
        tasks,
        next_sequence: sequence,
    }
}
