//! Core domain types shared across the engine

pub mod findings;
pub mod keywords;
pub mod message;
pub mod task;
pub mod work;

pub use findings::{
    AccuracyTrend, EvaluationScores, LegalFindings, Precedent, PrecedentMatch, ResearchSummary,
};
pub use message::{AgentMessage, MessageType};
pub use task::{AgentTask, TaskPayload, TaskPriority, TaskStatus, TaskType};
pub use work::{
    CaseRecord, CaseType, Classification, RawContent, StructuredInsight, WorkItem,
};

use serde::{Deserialize, Serialize};

/// Capability variant of a worker agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentKind {
    Research,
    LegalIntelligence,
    Evaluation,
}

impl AgentKind {
    /// Fixed execution order used by Sequential and as the Hierarchical tier order
    pub const ORDER: [AgentKind; 3] = [
        AgentKind::Research,
        AgentKind::LegalIntelligence,
        AgentKind::Evaluation,
    ];

    /// Stable identifier used in memory and message routing
    pub fn id(&self) -> &'static str {
        match self {
            AgentKind::Research => "research_agent",
            AgentKind::LegalIntelligence => "legal_intelligence_agent",
            AgentKind::Evaluation => "evaluation_agent",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|kind| kind.id() == id)
    }

    /// Position in the fixed order
    pub fn tier(&self) -> usize {
        match self {
            AgentKind::Research => 0,
            AgentKind::LegalIntelligence => 1,
            AgentKind::Evaluation => 2,
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Identifier the MetaController uses as a message sender
pub const META_CONTROLLER_ID: &str = "meta_controller";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_kind_ids_round_trip() {
        for kind in AgentKind::ORDER {
            assert_eq!(AgentKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(AgentKind::from_id(META_CONTROLLER_ID), None);
    }

    #[test]
    fn test_tier_matches_order() {
        for (idx, kind) in AgentKind::ORDER.iter().enumerate() {
            assert_eq!(kind.tier(), idx);
        }
    }
}
