//! Agent tasks and their lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AgentKind, WorkItem};
use crate::error::{DocketError, Result};

/// Task priority, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    /// Scaling applied to duration estimates
    pub fn duration_multiplier(&self) -> f64 {
        match self {
            TaskPriority::Low => 1.2,
            TaskPriority::Medium => 1.0,
            TaskPriority::High => 0.8,
            TaskPriority::Critical => 0.6,
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "LOW"),
            TaskPriority::Medium => write!(f, "MEDIUM"),
            TaskPriority::High => write!(f, "HIGH"),
            TaskPriority::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Pending -> InProgress -> {Completed | Failed}; nothing re-enters Pending
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Failed)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskType {
    UrlProcessing,
    PerformanceEvaluation,
    LegalIntelligence,
    PatternAnalysis,
    Coordination,
}

impl TaskType {
    /// Baseline duration in seconds before agent history is considered
    pub fn base_duration_secs(&self) -> f64 {
        match self {
            TaskType::UrlProcessing => 30.0,
            TaskType::PerformanceEvaluation => 45.0,
            TaskType::LegalIntelligence => 60.0,
            TaskType::PatternAnalysis => 40.0,
            TaskType::Coordination => 20.0,
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::UrlProcessing => write!(f, "url_processing"),
            TaskType::PerformanceEvaluation => write!(f, "performance_evaluation"),
            TaskType::LegalIntelligence => write!(f, "legal_intelligence"),
            TaskType::PatternAnalysis => write!(f, "pattern_analysis"),
            TaskType::Coordination => write!(f, "coordination"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    Item { item: WorkItem },
    Records { count: usize },
    Empty,
}

/// Unit of work assigned to one agent for one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: String,
    pub target_agent: AgentKind,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub payload: TaskPayload,
    /// Task ids planned in the same round that must resolve first; the
    /// owning agent is staged after the agents holding them
    pub dependencies: Vec<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub estimated_duration_secs: f64,
}

impl AgentTask {
    pub fn new(
        id: impl Into<String>,
        target_agent: AgentKind,
        task_type: TaskType,
        priority: TaskPriority,
        payload: TaskPayload,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            target_agent,
            task_type,
            priority,
            payload,
            dependencies: Vec::new(),
            status: TaskStatus::Pending,
            created_at,
            started_at: None,
            finished_at: None,
            deadline: None,
            result: None,
            estimated_duration_secs: task_type.base_duration_secs(),
        }
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn work_item(&self) -> Option<&WorkItem> {
        match &self.payload {
            TaskPayload::Item { item } => Some(item),
            _ => None,
        }
    }

    /// Overdue once `now` reaches the deadline, unless already completed
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != TaskStatus::Completed && self.deadline.map_or(false, |d| now >= d)
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(TaskStatus::InProgress)?;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn complete(&mut self, result: Option<serde_json::Value>, now: DateTime<Utc>) -> Result<()> {
        self.transition(TaskStatus::Completed)?;
        self.result = result;
        self.finished_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, reason: &str, now: DateTime<Utc>) -> Result<()> {
        self.transition(TaskStatus::Failed)?;
        self.result = Some(serde_json::json!({ "error": reason }));
        self.finished_at = Some(now);
        Ok(())
    }

    fn transition(&mut self, next: TaskStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(DocketError::InvalidStateTransition {
                from: format!("task {} {}", self.id, self.status),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn task() -> AgentTask {
        AgentTask::new(
            "task-1",
            AgentKind::Research,
            TaskType::UrlProcessing,
            TaskPriority::Medium,
            TaskPayload::Item {
                item: WorkItem::new("https://www.justice.gov/usao-sdny/pr/a"),
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_priority_ordering_and_multipliers() {
        assert!(TaskPriority::Critical > TaskPriority::High);
        assert!(TaskPriority::High > TaskPriority::Medium);
        assert!(TaskPriority::Medium > TaskPriority::Low);
        assert_eq!(TaskPriority::Low.duration_multiplier(), 1.2);
        assert_eq!(TaskPriority::Critical.duration_multiplier(), 0.6);
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let mut t = task();
        let now = Utc::now();
        t.start(now).unwrap();
        assert_eq!(t.status, TaskStatus::InProgress);
        t.complete(Some(serde_json::json!({"ok": true})), now).unwrap();
        assert_eq!(t.status, TaskStatus::Completed);
        assert!(t.finished_at.is_some());
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut t = task();
        let now = Utc::now();
        assert!(matches!(
            t.complete(None, now),
            Err(DocketError::InvalidStateTransition { .. })
        ));

        t.start(now).unwrap();
        t.fail("extractor returned nothing", now).unwrap();
        assert!(t.start(now).is_err());
        assert!(t.complete(None, now).is_err());
        assert_eq!(t.status, TaskStatus::Failed);
    }

    #[test]
    fn test_overdue() {
        let now = Utc::now();
        let t = task();
        assert!(!t.is_overdue(now));

        let t = task().with_deadline(now);
        assert!(t.is_overdue(now), "zero-length deadline is overdue immediately");

        let t = task().with_deadline(now + Duration::seconds(30));
        assert!(!t.is_overdue(now));
    }

    #[test]
    fn test_work_item_accessor() {
        assert!(task().work_item().is_some());
        let t = AgentTask::new(
            "task-2",
            AgentKind::Evaluation,
            TaskType::PerformanceEvaluation,
            TaskPriority::High,
            TaskPayload::Records { count: 5 },
            Utc::now(),
        );
        assert!(t.work_item().is_none());
        assert_eq!(t.estimated_duration_secs, 45.0);
    }
}
