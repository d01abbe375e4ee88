//! Round driver: workflow state machine, status handle and run report

pub mod orchestrator;
pub mod handle;
pub mod report;
pub mod workflow;

pub use handle::{OrchestratorHandle, OrchestratorStatus};
pub use orchestrator::{Collaborators, Orchestrator};
pub use report::{AgentSummary, CoordinationMetrics, RunReport};
pub use workflow::{Workflow, WorkflowPhase};
