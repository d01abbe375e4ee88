//! The four task lists: pending, in progress, completed, failed

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AgentKind, AgentTask, TaskStatus};
use crate::error::{DocketError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskBoard {
    pending: Vec<AgentTask>,
    in_progress: Vec<AgentTask>,
    completed: Vec<AgentTask>,
    failed: Vec<AgentTask>,
}

impl TaskBoard {
    pub fn enqueue(&mut self, task: AgentTask) -> Result<()> {
        if task.status != TaskStatus::Pending {
            return Err(DocketError::InvalidStateTransition {
                from: format!("task {} {}", task.id, task.status),
                to: TaskStatus::Pending.to_string(),
            });
        }
        self.pending.push(task);
        Ok(())
    }

    /// Move a pending task into progress
    pub fn start(&mut self, task_id: &str, now: DateTime<Utc>) -> Result<&AgentTask> {
        let idx = self
            .pending
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| DocketError::InvariantViolation(format!("task {task_id} is not pending")))?;
        let mut task = self.pending.remove(idx);
        task.start(now)?;
        self.in_progress.push(task);
        Ok(&self.in_progress[self.in_progress.len() - 1])
    }

    /// Resolve an in-progress task, returning the finished copy
    pub fn finish(
        &mut self,
        task_id: &str,
        success: bool,
        result: Option<serde_json::Value>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<AgentTask> {
        let idx = self
            .in_progress
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| {
                DocketError::InvariantViolation(format!("task {task_id} is not in progress"))
            })?;
        let mut task = self.in_progress.remove(idx);
        if success {
            task.complete(result, now)?;
            self.completed.push(task.clone());
        } else {
            task.fail(reason, now)?;
            self.failed.push(task.clone());
        }
        Ok(task)
    }

    pub fn find_in_progress(&self, task_id: &str) -> Option<&AgentTask> {
        self.in_progress.iter().find(|t| t.id == task_id)
    }

    pub fn pending_for(&self, agent: AgentKind) -> Vec<AgentTask> {
        self.pending
            .iter()
            .filter(|t| t.target_agent == agent)
            .cloned()
            .collect()
    }

    pub fn in_progress_for(&self, agent: AgentKind) -> Vec<AgentTask> {
        self.in_progress
            .iter()
            .filter(|t| t.target_agent == agent)
            .cloned()
            .collect()
    }

    /// Pending plus in-progress tasks per agent
    pub fn in_flight_counts(&self) -> BTreeMap<AgentKind, usize> {
        let mut counts = BTreeMap::new();
        for task in self.pending.iter().chain(self.in_progress.iter()) {
            *counts.entry(task.target_agent).or_insert(0) += 1;
        }
        counts
    }

    pub fn pending(&self) -> &[AgentTask] {
        &self.pending
    }

    pub fn in_progress(&self) -> &[AgentTask] {
        &self.in_progress
    }

    pub fn completed(&self) -> &[AgentTask] {
        &self.completed
    }

    pub fn failed(&self) -> &[AgentTask] {
        &self.failed
    }

    /// failed / (completed + failed) over every resolved task
    pub fn failure_ratio(&self) -> f64 {
        let resolved = self.completed.len() + self.failed.len();
        if resolved == 0 {
            0.0
        } else {
            self.failed.len() as f64 / resolved as f64
        }
    }

    pub fn has_unresolved(&self) -> bool {
        !self.pending.is_empty() || !self.in_progress.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskPayload, TaskPriority, TaskType};

    fn task(id: &str, agent: AgentKind) -> AgentTask {
        AgentTask::new(
            id,
            agent,
            TaskType::Coordination,
            TaskPriority::Medium,
            TaskPayload::Empty,
            Utc::now(),
        )
    }

    #[test]
    fn test_board_lifecycle() {
        let now = Utc::now();
        let mut board = TaskBoard::default();
        board.enqueue(task("t1", AgentKind::Research)).unwrap();
        board.enqueue(task("t2", AgentKind::Research)).unwrap();
        board.enqueue(task("t3", AgentKind::Evaluation)).unwrap();

        let counts = board.in_flight_counts();
        assert_eq!(counts[&AgentKind::Research], 2);
        assert_eq!(counts[&AgentKind::Evaluation], 1);

        board.start("t1", now).unwrap();
        assert_eq!(board.in_progress_for(AgentKind::Research).len(), 1);
        assert_eq!(board.pending_for(AgentKind::Research).len(), 1);

        let done = board.finish("t1", true, None, "", now).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);

        board.start("t3", now).unwrap();
        board.finish("t3", false, None, "boom", now).unwrap();
        assert_eq!(board.failure_ratio(), 0.5);
        assert!(board.has_unresolved());
    }

    #[test]
    fn test_unknown_task_is_rejected() {
        let now = Utc::now();
        let mut board = TaskBoard::default();
        assert!(board.start("missing", now).is_err());
        assert!(board.finish("missing", true, None, "", now).is_err());

        let mut started = task("t1", AgentKind::Research);
        started.start(now).unwrap();
        assert!(board.enqueue(started).is_err());
    }
}
