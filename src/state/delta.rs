//! Immutable state deltas and the merge that folds them into `SystemState`
//!
//! Merge rules: list fields append, optional scalars are last-writer-wins,
//! and the round counter takes the maximum. An empty delta changes nothing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ledger::WorkState;
use super::system::SystemState;
use crate::domain::{
    AgentKind, CaseRecord, EvaluationScores, LegalFindings, ResearchSummary, WorkItem,
};
use crate::error::{ErrorKind, ErrorRecord, Result};

/// Result an agent reports for one of its assigned tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: String,
    pub agent: AgentKind,
    pub item: Option<WorkItem>,
    pub success: bool,
    pub elapsed_secs: f64,
    pub result: Option<serde_json::Value>,
    /// Failure reason when `success` is false
    pub detail: Option<String>,
}

impl TaskOutcome {
    pub fn succeeded(
        task_id: impl Into<String>,
        agent: AgentKind,
        item: Option<WorkItem>,
        elapsed_secs: f64,
        result: Option<serde_json::Value>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            agent,
            item,
            success: true,
            elapsed_secs,
            result,
            detail: None,
        }
    }

    pub fn failed(
        task_id: impl Into<String>,
        agent: AgentKind,
        item: Option<WorkItem>,
        elapsed_secs: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            agent,
            item,
            success: false,
            elapsed_secs,
            result: None,
            detail: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub records: Vec<CaseRecord>,
    pub task_outcomes: Vec<TaskOutcome>,
    pub evaluations: Vec<EvaluationScores>,
    pub errors: Vec<ErrorRecord>,
    pub legal_findings: Option<LegalFindings>,
    pub research_summary: Option<ResearchSummary>,
    /// Measured accuracy per agent
    pub accuracy: BTreeMap<AgentKind, f64>,
    pub round: Option<u64>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        *self == StateDelta::default()
    }

    /// Combine two deltas with the same rules used by `SystemState::merge`
    pub fn combine(mut self, other: StateDelta) -> StateDelta {
        self.records.extend(other.records);
        self.task_outcomes.extend(other.task_outcomes);
        self.evaluations.extend(other.evaluations);
        self.errors.extend(other.errors);
        if other.legal_findings.is_some() {
            self.legal_findings = other.legal_findings;
        }
        if other.research_summary.is_some() {
            self.research_summary = other.research_summary;
        }
        self.accuracy.extend(other.accuracy);
        self.round = match (self.round, other.round) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self
    }
}

impl SystemState {
    /// Fold a delta into the state. Outcomes for tasks past their deadline
    /// are turned into failures and their records are dropped.
    pub fn merge(&mut self, delta: StateDelta, now: DateTime<Utc>) -> Result<()> {
        if let Some(round) = delta.round {
            self.round = self.round.max(round);
        }

        for outcome in delta.task_outcomes {
            let Some(task) = self.tasks.find_in_progress(&outcome.task_id).cloned() else {
                warn!(task = %outcome.task_id, agent = %outcome.agent, "outcome for a task that is not in progress");
                continue;
            };

            let overdue = task.is_overdue(now);
            let success = outcome.success && !overdue;
            let reason = if overdue {
                "deadline exceeded".to_string()
            } else {
                outcome.detail.clone().unwrap_or_default()
            };
            self.tasks
                .finish(&task.id, success, outcome.result.clone(), &reason, now)?;

            if let Some(item) = task.work_item() {
                if success {
                    self.ledger.complete(item)?;
                } else {
                    self.ledger.fail(item)?;
                }
            }

            if let Some(metrics) = self.performance.get_mut(&task.target_agent) {
                metrics.record_outcome(success, outcome.elapsed_secs, now);
            }

            if overdue {
                warn!(task = %task.id, agent = %task.target_agent, "task missed its deadline");
                self.errors.push(ErrorRecord::new(
                    ErrorKind::AgentProcessError,
                    task.target_agent.id(),
                    format!("task {} missed its deadline", task.id),
                    self.round,
                ));
            }
        }

        for record in delta.records {
            let completed = self.ledger.state_of(&record.item) == Some(WorkState::Completed);
            let duplicate = self.records.iter().any(|r| r.item == record.item);
            if completed && !duplicate {
                self.records.push(record);
            } else {
                debug!(item = %record.item, completed, duplicate, "dropping record");
            }
        }

        self.evaluations.extend(delta.evaluations);
        self.errors.extend(delta.errors);

        if delta.legal_findings.is_some() {
            self.legal_findings = delta.legal_findings;
        }
        if delta.research_summary.is_some() {
            self.research_summary = delta.research_summary;
        }
        for (agent, accuracy) in delta.accuracy {
            if let Some(metrics) = self.performance.get_mut(&agent) {
                metrics.accuracy = Some(accuracy);
            }
        }

        Ok(())
    }
}
