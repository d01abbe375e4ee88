use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::context::RoundContext;
use crate::domain::{AgentKind, EvaluationScores, LegalFindings, ResearchSummary, TaskType};
use crate::error::Result;
use crate::memory::{MemoryDelta, SharedMemoryStore};
use crate::state::StateDelta;

/// Capabilities an agent advertises for duration estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub kind: AgentKind,
    pub task_types: Vec<TaskType>,
    /// Baseline seconds per task type
    pub base_durations: BTreeMap<TaskType, f64>,
}

impl AgentDescriptor {
    pub fn new(kind: AgentKind, task_types: Vec<TaskType>) -> Self {
        let base_durations = task_types
            .iter()
            .map(|t| (*t, t.base_duration_secs()))
            .collect();
        Self {
            kind,
            task_types,
            base_durations,
        }
    }

    pub fn base_duration(&self, task_type: TaskType) -> f64 {
        self.base_durations
            .get(&task_type)
            .copied()
            .unwrap_or_else(|| task_type.base_duration_secs())
    }
}

/// Variant-specific result of one `process` call
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutput {
    Research(ResearchSummary),
    Evaluation(Option<EvaluationScores>),
    Legal(LegalFindings),
    Idle,
}

/// Everything an agent hands back from one round
#[derive(Debug, Clone, PartialEq)]
pub struct AgentUpdate {
    pub agent: AgentKind,
    pub state: StateDelta,
    pub memory: MemoryDelta,
    pub output: AgentOutput,
}

impl AgentUpdate {
    pub fn idle(agent: AgentKind) -> Self {
        Self {
            agent,
            state: StateDelta::default(),
            memory: MemoryDelta::default(),
            output: AgentOutput::Idle,
        }
    }

    /// Fold the typed output into the agent's disjoint state keys
    pub fn into_deltas(self) -> (StateDelta, MemoryDelta) {
        let mut state = self.state;
        match self.output {
            AgentOutput::Research(summary) => state.research_summary = Some(summary),
            AgentOutput::Evaluation(Some(scores)) => state.evaluations.push(scores),
            AgentOutput::Legal(findings) => state.legal_findings = Some(findings),
            AgentOutput::Evaluation(None) | AgentOutput::Idle => {}
        }
        (state, self.memory)
    }
}

/// Worker contract shared by every agent variant
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Agent: Send + Sync {
    fn kind(&self) -> AgentKind;

    fn id(&self) -> &'static str {
        self.kind().id()
    }

    /// Seed this agent's memory; called once before the first round
    fn initialize_memory(&self, store: &mut SharedMemoryStore);

    /// Process assigned tasks against an immutable snapshot and return the
    /// changes to merge. No retries happen here.
    async fn process(&self, ctx: &RoundContext) -> Result<AgentUpdate>;

    fn describe(&self) -> AgentDescriptor;
}
