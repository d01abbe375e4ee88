//! Shared Memory Store
//!
//! The single mutable knowledge and communication hub of a run. The
//! orchestrator is its only writer; agents read it through `MemoryView`
//! copies and write back through `MemoryDelta`.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::agent_memory::{AgentMemory, Interaction, KnowledgeEntry, LearnedPattern};
use super::view::{MemoryDelta, MemoryView, SharedEntry};
use crate::config::MemoryConfig;
use crate::domain::{AgentMessage, MessageType};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SharedKey {
    from: String,
    to: String,
    key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalInsight {
    pub source: String,
    pub text: String,
    pub recorded_at: DateTime<Utc>,
}

/// Aggregate view of the communication log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunicationSummary {
    /// Messages currently retained in the log
    pub total: usize,
    /// Distinct (from, to) pairs among retained messages
    pub distinct_pairs: usize,
    pub type_histogram: BTreeMap<MessageType, usize>,
}

pub struct SharedMemoryStore {
    config: MemoryConfig,
    agents: HashMap<String, AgentMemory>,
    shared: HashMap<SharedKey, KnowledgeEntry>,
    log: VecDeque<AgentMessage>,
    insights: VecDeque<GlobalInsight>,
    metrics: BTreeMap<String, f64>,
    /// Messages ever recorded, including pruned ones
    messages_recorded: u64,
}

impl SharedMemoryStore {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            agents: HashMap::new(),
            shared: HashMap::new(),
            log: VecDeque::new(),
            insights: VecDeque::new(),
            metrics: BTreeMap::new(),
            messages_recorded: 0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(MemoryConfig::default())
    }

    pub fn get_or_create_agent_memory(&mut self, agent_id: &str) -> &mut AgentMemory {
        let pattern_cap = self.config.pattern_cap;
        let interaction_cap = self.config.interaction_cap;
        self.agents
            .entry(agent_id.to_string())
            .or_insert_with(|| AgentMemory::new(agent_id, pattern_cap, interaction_cap))
    }

    pub fn agent_memory(&self, agent_id: &str) -> Option<&AgentMemory> {
        self.agents.get(agent_id)
    }

    /// Record a cross-agent knowledge association and log it as a message
    pub fn share(&mut self, from: &str, to: &str, key: &str, value: serde_json::Value) {
        self.shared.insert(
            SharedKey {
                from: from.to_string(),
                to: to.to_string(),
                key: key.to_string(),
            },
            KnowledgeEntry {
                value: value.clone(),
                timestamp: Utc::now(),
                source: from.to_string(),
            },
        );
        self.record_message(AgentMessage::new(
            from,
            to,
            MessageType::KnowledgeShare,
            key,
            value,
        ));
    }

    pub fn get_knowledge(&self, agent_id: &str, key: &str) -> Option<&serde_json::Value> {
        self.agents
            .get(agent_id)
            .and_then(|memory| memory.recall(key))
            .map(|entry| &entry.value)
    }

    /// Most recent `limit` patterns an agent learned, oldest first
    pub fn recent_patterns(&self, agent_id: &str, limit: usize) -> Vec<&LearnedPattern> {
        self.agents
            .get(agent_id)
            .map(|memory| memory.recent_patterns(limit))
            .unwrap_or_default()
    }

    pub fn get_shared(&self, from: &str, to: &str, key: &str) -> Option<&serde_json::Value> {
        self.shared
            .get(&SharedKey {
                from: from.to_string(),
                to: to.to_string(),
                key: key.to_string(),
            })
            .map(|entry| &entry.value)
    }

    /// Append to the bounded communication log, noting the interaction on
    /// both endpoints that have memories
    pub fn record_message(&mut self, message: AgentMessage) {
        let outbound = Interaction {
            peer: message.to.clone(),
            kind: message.kind,
            topic: message.topic.clone(),
            outbound: true,
            at: message.timestamp,
        };
        let inbound = Interaction {
            peer: message.from.clone(),
            outbound: false,
            ..outbound.clone()
        };
        if let Some(memory) = self.agents.get_mut(&message.from) {
            memory.record_interaction(outbound);
        }
        if let Some(memory) = self.agents.get_mut(&message.to) {
            memory.record_interaction(inbound);
        }

        self.log.push_back(message);
        self.messages_recorded += 1;
        while self.log.len() > self.config.communication_log_cap {
            self.log.pop_front();
        }
    }

    pub fn add_global_insight(&mut self, source: &str, text: impl Into<String>) {
        self.insights.push_back(GlobalInsight {
            source: source.to_string(),
            text: text.into(),
            recorded_at: Utc::now(),
        });
        while self.insights.len() > self.config.global_insight_cap {
            self.insights.pop_front();
        }
    }

    pub fn update_metric(&mut self, name: &str, value: f64) {
        self.metrics.insert(name.to_string(), value);
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn metrics(&self) -> &BTreeMap<String, f64> {
        &self.metrics
    }

    pub fn summarize_communications(&self) -> CommunicationSummary {
        let mut pairs = BTreeSet::new();
        let mut type_histogram = BTreeMap::new();
        for message in &self.log {
            pairs.insert((message.from.as_str(), message.to.as_str()));
            *type_histogram.entry(message.kind).or_insert(0) += 1;
        }
        CommunicationSummary {
            total: self.log.len(),
            distinct_pairs: pairs.len(),
            type_histogram,
        }
    }

    /// Distinct directed pairs among the given participants only
    pub fn distinct_pairs_among(&self, participants: &[&str]) -> usize {
        self.log
            .iter()
            .filter(|m| m.from != m.to)
            .filter(|m| participants.contains(&m.from.as_str()))
            .filter(|m| participants.contains(&m.to.as_str()))
            .map(|m| (m.from.as_str(), m.to.as_str()))
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn communication_log(&self) -> impl Iterator<Item = &AgentMessage> {
        self.log.iter()
    }

    pub fn messages_recorded(&self) -> u64 {
        self.messages_recorded
    }

    pub fn global_insights(&self) -> impl Iterator<Item = &GlobalInsight> {
        self.insights.iter()
    }

    /// Messages addressed to `agent_id`, oldest first
    pub fn inbox(&self, agent_id: &str, since: Option<DateTime<Utc>>) -> Vec<AgentMessage> {
        self.log
            .iter()
            .filter(|m| m.to == agent_id)
            .filter(|m| since.map_or(true, |t| m.timestamp >= t))
            .cloned()
            .collect()
    }

    /// Read-only copy handed to an agent for one round
    pub fn view_for(&self, agent_id: &str, since: Option<DateTime<Utc>>) -> MemoryView {
        let memory = self.agents.get(agent_id).cloned().unwrap_or_else(|| {
            AgentMemory::new(agent_id, self.config.pattern_cap, self.config.interaction_cap)
        });
        let shared = self
            .shared
            .iter()
            .filter(|(key, _)| key.to == agent_id)
            .map(|(key, entry)| SharedEntry {
                from: key.from.clone(),
                key: key.key.clone(),
                value: entry.value.clone(),
                timestamp: entry.timestamp,
            })
            .collect();
        MemoryView::new(memory, self.inbox(agent_id, since), shared)
    }

    /// Apply an agent's memory delta
    pub fn apply(&mut self, agent_id: &str, delta: MemoryDelta) {
        if delta.is_empty() {
            return;
        }
        debug!(
            agent = agent_id,
            knowledge = delta.knowledge.len(),
            patterns = delta.patterns.len(),
            shares = delta.shares.len(),
            insights = delta.insights.len(),
            "applying memory delta"
        );

        {
            let memory = self.get_or_create_agent_memory(agent_id);
            for (key, value) in delta.knowledge {
                memory.remember(key, value, agent_id);
            }
            for pattern in delta.patterns {
                memory.learn_pattern(pattern);
            }
        }
        for share in delta.shares {
            self.share(agent_id, &share.to, &share.key, share.value);
        }
        for insight in delta.insights {
            self.add_global_insight(agent_id, insight);
        }
        for (name, value) in delta.metrics {
            self.update_metric(&name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn small_store() -> SharedMemoryStore {
        SharedMemoryStore::new(MemoryConfig {
            communication_log_cap: 5,
            global_insight_cap: 3,
            pattern_cap: 10,
            interaction_cap: 10,
        })
    }

    #[test]
    fn test_share_and_get_shared() {
        let mut store = small_store();
        store.get_or_create_agent_memory("research_agent");
        store.get_or_create_agent_memory("evaluation_agent");
        store.share("research_agent", "evaluation_agent", "pattern_insights", json!({"n": 3}));

        assert_eq!(
            store.get_shared("research_agent", "evaluation_agent", "pattern_insights"),
            Some(&json!({"n": 3}))
        );
        assert!(store
            .get_shared("evaluation_agent", "research_agent", "pattern_insights")
            .is_none());

        let summary = store.summarize_communications();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.distinct_pairs, 1);
        assert_eq!(summary.type_histogram[&MessageType::KnowledgeShare], 1);

        let evaluation = store.agent_memory("evaluation_agent").unwrap();
        assert_eq!(evaluation.interactions().count(), 1);
    }

    #[test]
    fn test_communication_log_never_exceeds_cap() {
        let mut store = small_store();
        for i in 0..50 {
            store.share("a", "b", &format!("k{i}"), json!(i));
            assert!(store.communication_log().count() <= 5);
        }
        assert_eq!(store.messages_recorded(), 50);
        let first = store.communication_log().next().unwrap();
        assert_eq!(first.topic, "k45");
    }

    #[test]
    fn test_global_insights_are_capped() {
        let mut store = small_store();
        for i in 0..4 {
            store.add_global_insight("meta_controller", format!("insight {i}"));
        }
        let texts: Vec<_> = store.global_insights().map(|i| i.text.clone()).collect();
        assert_eq!(texts, vec!["insight 1", "insight 2", "insight 3"]);
    }

    #[test]
    fn test_distinct_pairs_among_ignores_outsiders() {
        let mut store = small_store();
        store.share("research_agent", "legal_intelligence_agent", "x", json!(1));
        store.share("research_agent", "legal_intelligence_agent", "y", json!(2));
        store.share("meta_controller", "research_agent", "z", json!(3));
        assert_eq!(
            store.distinct_pairs_among(&["research_agent", "legal_intelligence_agent"]),
            1
        );
        assert_eq!(store.summarize_communications().distinct_pairs, 2);
    }

    #[test]
    fn test_view_and_apply() {
        let mut store = small_store();
        store.get_or_create_agent_memory("legal_intelligence_agent");
        store.share("research_agent", "legal_intelligence_agent", "pattern_insights", json!([1]));

        let view = store.view_for("legal_intelligence_agent", None);
        assert_eq!(view.inbox().len(), 1);
        assert_eq!(
            view.shared_from("research_agent", "pattern_insights"),
            Some(&json!([1]))
        );

        let mut delta = MemoryDelta::default();
        delta.remember("last_round", json!(1));
        delta.learn(LearnedPattern::new("jurisdiction", json!({"SDNY": 2})));
        delta.share_with("research_agent", "legal_insights", json!({"ok": true}));
        delta.insight("SDNY shows repeated wire fraud");
        delta.metric("legal.validation_rate", 0.9);
        store.apply("legal_intelligence_agent", delta);

        let memory = store.agent_memory("legal_intelligence_agent").unwrap();
        assert!(memory.recall("last_round").is_some());
        assert_eq!(memory.patterns().count(), 1);
        assert_eq!(
            store.get_knowledge("legal_intelligence_agent", "last_round"),
            Some(&json!(1))
        );
        assert_eq!(store.recent_patterns("legal_intelligence_agent", 5).len(), 1);
        assert!(store.recent_patterns("nobody", 5).is_empty());
        assert_eq!(
            store.get_shared("legal_intelligence_agent", "research_agent", "legal_insights"),
            Some(&json!({"ok": true}))
        );
        assert_eq!(store.global_insights().count(), 1);
        assert_eq!(store.metric("legal.validation_rate"), Some(0.9));
    }

    #[test]
    fn test_apply_empty_delta_is_noop() {
        let mut store = small_store();
        store.apply("research_agent", MemoryDelta::default());
        assert!(store.agent_memory("research_agent").is_none());
        assert_eq!(store.messages_recorded(), 0);
    }
}
