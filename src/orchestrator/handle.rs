use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::workflow::WorkflowPhase;
use crate::coordination::CoordinationStrategy;

/// Point-in-time orchestrator status for monitoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub active_strategy: CoordinationStrategy,
    pub rounds_completed: u64,
    /// Messages recorded on the bus so far
    pub message_count: u64,
    pub phase: WorkflowPhase,
}

impl Default for OrchestratorStatus {
    fn default() -> Self {
        Self {
            active_strategy: CoordinationStrategy::default(),
            rounds_completed: 0,
            message_count: 0,
            phase: WorkflowPhase::Initialize,
        }
    }
}

/// Clonable read handle onto a running orchestrator
#[derive(Clone, Default)]
pub struct OrchestratorHandle {
    status: Arc<RwLock<OrchestratorStatus>>,
}

impl OrchestratorHandle {
    pub async fn status(&self) -> OrchestratorStatus {
        self.status.read().await.clone()
    }

    pub(crate) async fn publish(&self, status: OrchestratorStatus) {
        *self.status.write().await = status;
    }
}
