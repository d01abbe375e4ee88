//! Workflow state machine
//!
//! Initialize → Plan → Execute → Evaluate → {Coordinate → Plan | Finalize}.
//! Any phase may jump to Finalize on a fatal error.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DocketError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Initialize,
    Plan,
    Execute,
    Evaluate,
    Coordinate,
    Finalize,
}

impl WorkflowPhase {
    pub fn can_transition_to(&self, next: WorkflowPhase) -> bool {
        use WorkflowPhase::*;
        matches!(
            (self, next),
            (Initialize, Plan)
                | (Plan, Execute)
                | (Execute, Evaluate)
                | (Evaluate, Coordinate)
                | (Evaluate, Finalize)
                | (Coordinate, Plan)
        ) || (next == Finalize && *self != Finalize)
    }

    pub fn is_terminal(&self) -> bool {
        *self == WorkflowPhase::Finalize
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowPhase::Initialize => write!(f, "initialize"),
            WorkflowPhase::Plan => write!(f, "plan"),
            WorkflowPhase::Execute => write!(f, "execute"),
            WorkflowPhase::Evaluate => write!(f, "evaluate"),
            WorkflowPhase::Coordinate => write!(f, "coordinate"),
            WorkflowPhase::Finalize => write!(f, "finalize"),
        }
    }
}

/// Current phase plus the transition guard
#[derive(Debug, Clone)]
pub struct Workflow {
    phase: WorkflowPhase,
}

impl Default for Workflow {
    fn default() -> Self {
        Self {
            phase: WorkflowPhase::Initialize,
        }
    }
}

impl Workflow {
    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    pub fn advance(&mut self, next: WorkflowPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(DocketError::InvalidStateTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        debug!(from = %self.phase, to = %next, "workflow transition");
        self.phase = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_cycle() {
        let mut wf = Workflow::default();
        for next in [
            WorkflowPhase::Plan,
            WorkflowPhase::Execute,
            WorkflowPhase::Evaluate,
            WorkflowPhase::Coordinate,
            WorkflowPhase::Plan,
            WorkflowPhase::Execute,
            WorkflowPhase::Evaluate,
            WorkflowPhase::Finalize,
        ] {
            wf.advance(next).unwrap();
        }
        assert!(wf.phase().is_terminal());
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut wf = Workflow::default();
        assert!(wf.advance(WorkflowPhase::Execute).is_err());
        wf.advance(WorkflowPhase::Plan).unwrap();
        assert!(wf.advance(WorkflowPhase::Coordinate).is_err());
        assert_eq!(wf.phase(), WorkflowPhase::Plan);
    }

    #[test]
    fn test_any_phase_can_abort_to_finalize() {
        for phase in [
            WorkflowPhase::Initialize,
            WorkflowPhase::Plan,
            WorkflowPhase::Execute,
            WorkflowPhase::Coordinate,
        ] {
            assert!(phase.can_transition_to(WorkflowPhase::Finalize));
        }
        assert!(!WorkflowPhase::Finalize.can_transition_to(WorkflowPhase::Finalize));
        assert!(!WorkflowPhase::Finalize.can_transition_to(WorkflowPhase::Plan));
    }
}
