use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the orchestration engine
#[derive(Error, Debug)]
pub enum DocketError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Collaborator errors
    #[error("Collaborator failure: {collaborator} - {reason}")]
    Collaborator { collaborator: String, reason: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    // Agent / coordination errors
    #[error("Agent {agent} failed: {reason}")]
    AgentProcess { agent: String, reason: String },

    #[error("Coordination error: {0}")]
    Coordination(String),

    // State machine errors
    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DocketError>;

impl DocketError {
    pub fn collaborator(collaborator: impl Into<String>, reason: impl Into<String>) -> Self {
        DocketError::Collaborator {
            collaborator: collaborator.into(),
            reason: reason.into(),
        }
    }

    pub fn agent(agent: impl Into<String>, reason: impl Into<String>) -> Self {
        DocketError::AgentProcess {
            agent: agent.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error into the run-level taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocketError::Collaborator { .. }
            | DocketError::MalformedResponse(_)
            | DocketError::Timeout(_) => ErrorKind::CollaboratorFailure,
            DocketError::AgentProcess { .. } => ErrorKind::AgentProcessError,
            DocketError::Coordination(_) => ErrorKind::CoordinationError,
            _ => ErrorKind::FatalOrchestratorError,
        }
    }
}

/// Error classes recorded in a run's error log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Extractor, language service or evaluator failed; the round continues
    CollaboratorFailure,
    /// An agent's `process` failed; the agent is marked Error for that round
    AgentProcessError,
    /// Strategy planning failed; the round falls back to Hierarchical
    CoordinationError,
    /// The driver itself failed; the run finalizes unsuccessfully
    FatalOrchestratorError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::CollaboratorFailure => write!(f, "CollaboratorFailure"),
            ErrorKind::AgentProcessError => write!(f, "AgentProcessError"),
            ErrorKind::CoordinationError => write!(f, "CoordinationError"),
            ErrorKind::FatalOrchestratorError => write!(f, "FatalOrchestratorError"),
        }
    }
}

/// One entry in a run's error log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    /// Agent id or component name that produced the error
    pub source: String,
    pub message: String,
    pub round: u64,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(
        kind: ErrorKind,
        source: impl Into<String>,
        message: impl Into<String>,
        round: u64,
    ) -> Self {
        Self {
            kind,
            source: source.into(),
            message: message.into(),
            round,
            timestamp: Utc::now(),
        }
    }

    pub fn from_error(source: impl Into<String>, err: &DocketError, round: u64) -> Self {
        Self::new(err.kind(), source, err.to_string(), round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            DocketError::collaborator("extractor", "absent").kind(),
            ErrorKind::CollaboratorFailure
        );
        assert_eq!(
            DocketError::Timeout("language service".into()).kind(),
            ErrorKind::CollaboratorFailure
        );
        assert_eq!(
            DocketError::agent("research", "boom").kind(),
            ErrorKind::AgentProcessError
        );
        assert_eq!(
            DocketError::Coordination("no strategy".into()).kind(),
            ErrorKind::CoordinationError
        );
        assert_eq!(
            DocketError::InvariantViolation("ledger".into()).kind(),
            ErrorKind::FatalOrchestratorError
        );
    }

    #[test]
    fn test_error_record_from_error() {
        let err = DocketError::agent("evaluation", "evaluator offline");
        let record = ErrorRecord::from_error("evaluation", &err, 2);
        assert_eq!(record.kind, ErrorKind::AgentProcessError);
        assert_eq!(record.round, 2);
        assert!(record.message.contains("evaluator offline"));
    }
}
