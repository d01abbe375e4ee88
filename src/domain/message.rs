use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Knowledge shared from one agent to another
    KnowledgeShare,
    /// Strategy guidance from the MetaController
    MetaGuidance,
    /// Task ids assigned for the coming round
    TaskAssignment,
    /// Corrective action for an agent with a performance alert
    PerformanceAdjustment,
    StatusReport,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::KnowledgeShare => write!(f, "knowledge_share"),
            MessageType::MetaGuidance => write!(f, "meta_guidance"),
            MessageType::TaskAssignment => write!(f, "task_assignment"),
            MessageType::PerformanceAdjustment => write!(f, "performance_adjustment"),
            MessageType::StatusReport => write!(f, "status_report"),
        }
    }
}

/// Immutable entry in the communication log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: Uuid,
    pub from: String,
    pub to: String,
    pub kind: MessageType,
    pub topic: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AgentMessage {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        kind: MessageType,
        topic: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from: from.into(),
            to: to.into(),
            kind,
            topic: topic.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}
