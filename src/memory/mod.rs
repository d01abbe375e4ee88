//! Shared memory and the inter-agent message bus

pub mod agent_memory;
pub mod store;
pub mod view;

pub use agent_memory::{AgentMemory, Interaction, KnowledgeEntry, LearnedPattern};
pub use store::{CommunicationSummary, GlobalInsight, SharedMemoryStore};
pub use view::{MemoryDelta, MemoryView, ShareRequest, SharedEntry};
