pub mod agents;
pub mod cli;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod convergence;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod state;

pub use agents::{Agent, AgentDescriptor, AgentOutput, AgentUpdate, RoundContext};
pub use collaborators::{
    Extractor, FeedbackSink, NaturalLanguageService, PerformanceEvaluator, WorkSource,
};
pub use config::AppConfig;
pub use controller::{CoordinationDecision, MetaController, RoundPlanner};
pub use convergence::{ConvergenceAssessment, ConvergenceEvaluator};
pub use coordination::CoordinationStrategy;
pub use domain::{AgentKind, CaseRecord, WorkItem};
pub use error::{DocketError, ErrorKind, ErrorRecord, Result};
pub use memory::SharedMemoryStore;
pub use orchestrator::{
    Collaborators, Orchestrator, OrchestratorHandle, OrchestratorStatus, RunReport,
    WorkflowPhase,
};
pub use state::SystemState;
