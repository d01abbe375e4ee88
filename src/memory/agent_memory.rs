use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::MessageType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub value: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub label: String,
    pub detail: serde_json::Value,
    pub learned_at: DateTime<Utc>,
}

impl LearnedPattern {
    pub fn new(label: impl Into<String>, detail: serde_json::Value) -> Self {
        Self {
            label: label.into(),
            detail,
            learned_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub peer: String,
    pub kind: MessageType,
    pub topic: String,
    pub outbound: bool,
    pub at: DateTime<Utc>,
}

/// Per-agent knowledge, learned patterns and interaction history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMemory {
    agent_id: String,
    knowledge: HashMap<String, KnowledgeEntry>,
    patterns: VecDeque<LearnedPattern>,
    interactions: VecDeque<Interaction>,
    pattern_cap: usize,
    interaction_cap: usize,
}

impl AgentMemory {
    pub fn new(agent_id: impl Into<String>, pattern_cap: usize, interaction_cap: usize) -> Self {
        Self {
            agent_id: agent_id.into(),
            knowledge: HashMap::new(),
            patterns: VecDeque::new(),
            interactions: VecDeque::new(),
            pattern_cap,
            interaction_cap,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn remember(&mut self, key: impl Into<String>, value: serde_json::Value, source: &str) {
        self.knowledge.insert(
            key.into(),
            KnowledgeEntry {
                value,
                timestamp: Utc::now(),
                source: source.to_string(),
            },
        );
    }

    pub fn recall(&self, key: &str) -> Option<&KnowledgeEntry> {
        self.knowledge.get(key)
    }

    pub fn knowledge_len(&self) -> usize {
        self.knowledge.len()
    }

    pub fn learn_pattern(&mut self, pattern: LearnedPattern) {
        self.patterns.push_back(pattern);
        while self.patterns.len() > self.pattern_cap {
            self.patterns.pop_front();
        }
    }

    pub fn record_interaction(&mut self, interaction: Interaction) {
        self.interactions.push_back(interaction);
        while self.interactions.len() > self.interaction_cap {
            self.interactions.pop_front();
        }
    }

    pub fn patterns(&self) -> impl Iterator<Item = &LearnedPattern> {
        self.patterns.iter()
    }

    /// Most recent patterns, newest last
    pub fn recent_patterns(&self, limit: usize) -> Vec<&LearnedPattern> {
        let skip = self.patterns.len().saturating_sub(limit);
        self.patterns.iter().skip(skip).collect()
    }

    pub fn interactions(&self) -> impl Iterator<Item = &Interaction> {
        self.interactions.iter()
    }
}
