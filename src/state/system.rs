//! System state: the orchestrator-owned view of a run

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ledger::{WorkLedger, WorkState};
use super::metrics::AgentPerformanceMetrics;
use super::tasks::TaskBoard;
use crate::coordination::{AdaptiveTracker, CoordinationStrategy};
use crate::domain::{
    AgentKind, AgentTask, CaseRecord, EvaluationScores, LegalFindings, ResearchSummary,
};
use crate::error::{DocketError, ErrorKind, ErrorRecord, Result};

/// Per-round status of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentStatus {
    Initializing,
    Idle,
    Running,
    /// Failed this round; cleared when the next round dispatches
    Error,
    Stopped,
}

impl AgentStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, AgentStatus::Idle | AgentStatus::Running)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Initializing => write!(f, "INITIALIZING"),
            AgentStatus::Idle => write!(f, "IDLE"),
            AgentStatus::Running => write!(f, "RUNNING"),
            AgentStatus::Error => write!(f, "ERROR"),
            AgentStatus::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Communication figures copied from the memory store at each barrier
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunicationSnapshot {
    pub messages_last_round: usize,
    /// Distinct directed pairs among managed agents
    pub distinct_agent_pairs: usize,
    /// Messages currently held in the communication log
    pub messages_retained: usize,
    /// Distinct message types in the communication log
    pub message_types: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    pub active_agents: BTreeSet<AgentKind>,
    pub agent_status: BTreeMap<AgentKind, AgentStatus>,
    pub ledger: WorkLedger,
    pub tasks: TaskBoard,
    pub performance: BTreeMap<AgentKind, AgentPerformanceMetrics>,
    pub strategy: CoordinationStrategy,
    pub adaptive: AdaptiveTracker,
    pub records: Vec<CaseRecord>,
    pub evaluations: Vec<EvaluationScores>,
    pub legal_findings: Option<LegalFindings>,
    pub research_summary: Option<ResearchSummary>,
    pub errors: Vec<ErrorRecord>,
    pub communication: CommunicationSnapshot,
    /// Completed rounds; only ever advanced by one
    pub round: u64,
    /// Source of deterministic task ids
    pub task_sequence: u64,
}

impl SystemState {
    pub fn new(
        agents: impl IntoIterator<Item = AgentKind>,
        ledger: WorkLedger,
        strategy: CoordinationStrategy,
        success_window: usize,
    ) -> Self {
        let active_agents: BTreeSet<_> = agents.into_iter().collect();
        let agent_status = active_agents
            .iter()
            .map(|a| (*a, AgentStatus::Initializing))
            .collect();
        let performance = active_agents
            .iter()
            .map(|a| (*a, AgentPerformanceMetrics::new(success_window)))
            .collect();
        Self {
            active_agents,
            agent_status,
            ledger,
            tasks: TaskBoard::default(),
            performance,
            strategy,
            adaptive: AdaptiveTracker::default(),
            records: Vec::new(),
            evaluations: Vec::new(),
            legal_findings: None,
            research_summary: None,
            errors: Vec::new(),
            communication: CommunicationSnapshot::default(),
            round: 0,
            task_sequence: 0,
        }
    }

    pub fn advance_round(&mut self) -> u64 {
        self.round += 1;
        self.round
    }

    pub fn set_status(&mut self, agent: AgentKind, status: AgentStatus) {
        self.agent_status.insert(agent, status);
    }

    pub fn status_of(&self, agent: AgentKind) -> Option<AgentStatus> {
        self.agent_status.get(&agent).copied()
    }

    pub fn record_error(&mut self, error: ErrorRecord) {
        self.errors.push(error);
    }

    /// Lowest rolling success rate among agents that have task history
    pub fn min_success_rate(&self) -> Option<f64> {
        self.performance
            .values()
            .filter_map(|m| m.rolling_success_rate())
            .fold(None, |acc: Option<f64>, rate| {
                Some(acc.map_or(rate, |a| a.min(rate)))
            })
    }

    /// Start every pending task for `agent`, moving its work items into
    /// progress. Returns the started tasks.
    pub fn dispatch(&mut self, agent: AgentKind, now: DateTime<Utc>) -> Result<Vec<AgentTask>> {
        let mut started = Vec::new();
        for task in self.tasks.pending_for(agent) {
            if let Some(item) = task.work_item() {
                self.ledger.start(item)?;
            }
            started.push(self.tasks.start(&task.id, now)?.clone());
        }
        self.set_status(agent, AgentStatus::Running);
        Ok(started)
    }

    /// Round barrier: fail every task still unresolved. Overdue tasks are
    /// logged as errors; the rest belong to agents that already failed.
    pub fn resolve_barrier(&mut self, now: DateTime<Utc>) -> Result<Vec<ErrorRecord>> {
        let mut errors = Vec::new();

        for task in self.tasks.pending().to_vec() {
            self.tasks.start(&task.id, now)?;
            if let Some(item) = task.work_item() {
                self.ledger.start(item)?;
            }
        }

        for task in self.tasks.in_progress().to_vec() {
            let overdue = task.is_overdue(now);
            let reason = if overdue {
                "deadline exceeded"
            } else {
                "unresolved at round barrier"
            };
            self.tasks.finish(&task.id, false, None, reason, now)?;
            if let Some(item) = task.work_item() {
                self.ledger.fail(item)?;
            }
            let elapsed = task
                .started_at
                .map(|s| (now - s).num_milliseconds() as f64 / 1000.0)
                .unwrap_or(0.0);
            if let Some(metrics) = self.performance.get_mut(&task.target_agent) {
                metrics.record_outcome(false, elapsed, now);
            }
            if overdue {
                warn!(task = %task.id, agent = %task.target_agent, "task missed its deadline");
                errors.push(ErrorRecord::new(
                    ErrorKind::AgentProcessError,
                    task.target_agent.id(),
                    format!("task {} missed its deadline", task.id),
                    self.round,
                ));
            }
        }

        self.errors.extend(errors.iter().cloned());
        Ok(errors)
    }

    /// Verify cross-structure invariants
    pub fn check_invariants(&self) -> Result<()> {
        self.ledger.check_invariants()?;
        for record in &self.records {
            if self.ledger.state_of(&record.item) != Some(WorkState::Completed) {
                return Err(DocketError::InvariantViolation(format!(
                    "record {} refers to unfinished item {}",
                    record.id, record.item
                )));
            }
        }
        Ok(())
    }
}
