use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::controller::CoordinationDecision;
use crate::convergence::ConvergenceAssessment;
use crate::coordination::CoordinationStrategy;
use crate::domain::{AgentKind, CaseRecord, MessageType};
use crate::error::ErrorRecord;
use crate::memory::GlobalInsight;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub avg_processing_secs: f64,
    pub accuracy: Option<f64>,
}

/// Aggregate coordination figures for a finished run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinationMetrics {
    pub items_total: usize,
    pub items_completed: usize,
    pub items_failed: usize,
    pub items_pending: usize,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    pub messages_total: u64,
    pub distinct_pairs: usize,
    pub message_types: BTreeMap<MessageType, usize>,
    /// Rounds each strategy was active
    pub strategy_usage: BTreeMap<CoordinationStrategy, u64>,
    pub fallback_rounds: u64,
    pub agents: BTreeMap<AgentKind, AgentSummary>,
}

/// Outcome of `Orchestrator::run`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub records: Vec<CaseRecord>,
    pub coordination_metrics: CoordinationMetrics,
    pub decision_history: Vec<CoordinationDecision>,
    pub success: bool,
    pub error_log: Vec<ErrorRecord>,
    pub rounds: u64,
    pub final_assessment: Option<ConvergenceAssessment>,
    pub insights: Vec<GlobalInsight>,
}

impl RunReport {
    pub fn fraud_cases(&self) -> usize {
        self.records.iter().filter(|r| r.is_fraud()).count()
    }
}
