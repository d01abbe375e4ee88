//! Per-round input handed to an agent

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{AgentKind, AgentTask, TaskType};
use crate::memory::MemoryView;
use crate::state::SystemState;

#[derive(Debug, Clone)]
pub struct RoundContext {
    pub agent: AgentKind,
    /// Rounds completed before this one
    pub round: u64,
    pub snapshot: Arc<SystemState>,
    /// Tasks dispatched to this agent for the round
    pub tasks: Vec<AgentTask>,
    pub memory: MemoryView,
    pub started_at: DateTime<Utc>,
}

impl RoundContext {
    pub fn tasks_of(&self, task_type: TaskType) -> impl Iterator<Item = &AgentTask> {
        self.tasks.iter().filter(move |t| t.task_type == task_type)
    }

    pub fn has_tasks(&self) -> bool {
        !self.tasks.is_empty()
    }
}
