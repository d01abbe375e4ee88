//! Agent contract and the capability variants implementing it

pub mod context;
pub mod evaluation;
pub mod legal;
pub mod research;
pub mod traits;

pub use context::RoundContext;
pub use evaluation::{CoordinationReview, EvaluationAgent};
pub use legal::LegalIntelligenceAgent;
pub use research::ResearchAgent;
pub use traits::{Agent, AgentDescriptor, AgentOutput, AgentUpdate};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use chrono::Utc;

    use super::RoundContext;
    use crate::coordination::CoordinationStrategy;
    use crate::domain::{AgentKind, AgentTask, TaskPayload, TaskPriority, TaskType, WorkItem};
    use crate::memory::SharedMemoryStore;
    use crate::state::{SystemState, WorkLedger};

    pub fn item(n: usize) -> WorkItem {
        WorkItem::new(format!("https://www.justice.gov/usao-sdny/pr/case-{n}"))
    }

    pub fn state(items: usize) -> SystemState {
        SystemState::new(
            AgentKind::ORDER,
            WorkLedger::from_items((0..items).map(item), 100),
            CoordinationStrategy::Sequential,
            10,
        )
    }

    pub fn url_task(n: usize) -> AgentTask {
        AgentTask::new(
            format!("task-{n}"),
            AgentKind::Research,
            TaskType::UrlProcessing,
            TaskPriority::Medium,
            TaskPayload::Item { item: item(n) },
            Utc::now(),
        )
    }

    pub fn task_for(agent: AgentKind, task_type: TaskType) -> AgentTask {
        AgentTask::new(
            format!("task-{task_type}"),
            agent,
            task_type,
            TaskPriority::Medium,
            TaskPayload::Empty,
            Utc::now(),
        )
    }

    pub fn context(agent: AgentKind, state: SystemState, tasks: Vec<AgentTask>) -> RoundContext {
        let store = SharedMemoryStore::with_defaults();
        RoundContext {
            agent,
            round: state.round,
            snapshot: Arc::new(state),
            tasks,
            memory: store.view_for(agent.id(), None),
            started_at: Utc::now(),
        }
    }
}
