//! Meta-level round planning: health, strategy choice and task allocation

pub mod allocation;
pub mod health;
pub mod insights;
pub mod meta;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coordination::{CoordinationStrategy, ExecutionPlan};
use crate::domain::{AgentKind, AgentMessage, AgentTask, TaskPriority};
use crate::error::Result;
use crate::state::SystemState;

pub use allocation::{allocate_tasks, estimate_duration, priority_adjustments};
pub use health::{assess_health, Bottleneck, HealthReport, SystemHealth};
pub use insights::{
    MetaAnalysis, MetaInsights, PerformanceAlert, PerformanceMonitoring, StabilityForecast,
    SystemMaturity,
};
pub use meta::{MetaController, PlanningRules};

/// One round's coordination decision, kept in the bounded history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationDecision {
    /// Round this decision plans (1-based)
    pub round: u64,
    pub strategy: CoordinationStrategy,
    pub batch_size: usize,
    pub health: SystemHealth,
    pub effectiveness: f64,
    pub bottlenecks: Vec<Bottleneck>,
    pub strategy_scores: BTreeMap<CoordinationStrategy, f64>,
    pub priority_adjustments: BTreeMap<AgentKind, TaskPriority>,
    pub rationale: String,
    /// Produced by the fallback path after planning failed
    pub fallback: bool,
    #[serde(default)]
    pub analysis: MetaAnalysis,
    pub timestamp: DateTime<Utc>,
}

/// Everything needed to execute one round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundPlan {
    pub decision: CoordinationDecision,
    pub tasks: Vec<AgentTask>,
    pub execution: ExecutionPlan,
    /// `meta_guidance`, `performance_adjustment` and `task_assignment`
    /// messages for the bus
    pub guidance: Vec<AgentMessage>,
    pub next_task_sequence: u64,
}

/// Plans rounds from the merged system state
#[cfg_attr(test, mockall::automock)]
pub trait RoundPlanner: Send {
    fn plan_round(&mut self, state: &SystemState, now: DateTime<Utc>) -> Result<RoundPlan>;

    /// Append a decision to the bounded history
    fn record(&mut self, decision: CoordinationDecision);

    fn history(&self) -> Vec<CoordinationDecision>;

    /// Forget everything carried over from an earlier run
    fn reset(&mut self) {}
}
