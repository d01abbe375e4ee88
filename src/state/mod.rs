//! Orchestrator-owned system state and the delta merge discipline

pub mod delta;
pub mod ledger;
pub mod metrics;
pub mod system;
pub mod tasks;

pub use delta::{StateDelta, TaskOutcome};
pub use ledger::{WorkLedger, WorkState};
pub use metrics::AgentPerformanceMetrics;
pub use system::{AgentStatus, CommunicationSnapshot, SystemState};
pub use tasks::TaskBoard;
