use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent_memory::{AgentMemory, LearnedPattern};
use crate::domain::{AgentMessage, StructuredInsight};

/// Knowledge another agent shared with the viewing agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedEntry {
    pub from: String,
    pub key: String,
    pub value: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Read-only memory snapshot handed to an agent for one round
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryView {
    memory: AgentMemory,
    inbox: Vec<AgentMessage>,
    shared: Vec<SharedEntry>,
}

impl MemoryView {
    pub fn new(memory: AgentMemory, inbox: Vec<AgentMessage>, shared: Vec<SharedEntry>) -> Self {
        Self {
            memory,
            inbox,
            shared,
        }
    }

    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    pub fn inbox(&self) -> &[AgentMessage] {
        &self.inbox
    }

    pub fn shared_from(&self, from: &str, key: &str) -> Option<&serde_json::Value> {
        self.shared
            .iter()
            .find(|entry| entry.from == from && entry.key == key)
            .map(|entry| &entry.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareRequest {
    pub to: String,
    pub key: String,
    pub value: serde_json::Value,
}

/// Memory writes an agent requests; applied by the orchestrator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryDelta {
    pub knowledge: Vec<(String, serde_json::Value)>,
    pub patterns: Vec<LearnedPattern>,
    pub shares: Vec<ShareRequest>,
    pub insights: Vec<String>,
    pub metrics: Vec<(String, f64)>,
}

impl MemoryDelta {
    pub fn is_empty(&self) -> bool {
        self.knowledge.is_empty()
            && self.patterns.is_empty()
            && self.shares.is_empty()
            && self.insights.is_empty()
            && self.metrics.is_empty()
    }

    pub fn remember(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.knowledge.push((key.into(), value));
    }

    pub fn learn(&mut self, pattern: LearnedPattern) {
        self.patterns.push(pattern);
    }

    pub fn share_with(&mut self, to: &str, key: &str, value: serde_json::Value) {
        self.shares.push(ShareRequest {
            to: to.to_string(),
            key: key.to_string(),
            value,
        });
    }

    pub fn insight(&mut self, text: impl Into<String>) {
        self.insights.push(text.into());
    }

    /// Record each part of a parsed insight as a global insight about `subject`
    pub fn insight_points(&mut self, subject: &str, insight: StructuredInsight) {
        if let Some(summary) = insight.summary {
            self.insights.push(format!("{subject}: {summary}"));
        }
        for point in insight.points {
            self.insights.push(format!("{subject}: {point}"));
        }
    }

    pub fn metric(&mut self, name: impl Into<String>, value: f64) {
        self.metrics.push((name.into(), value));
    }
}
