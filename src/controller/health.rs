//! System health classification

use serde::{Deserialize, Serialize};

use crate::config::ControllerConfig;
use crate::state::SystemState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemHealth {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl std::fmt::Display for SystemHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemHealth::Excellent => write!(f, "excellent"),
            SystemHealth::Good => write!(f, "good"),
            SystemHealth::Fair => write!(f, "fair"),
            SystemHealth::Poor => write!(f, "poor"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bottleneck {
    /// Pending work above the backlog threshold
    Backlog,
    /// Failed share of resolved tasks above the failure threshold
    TaskFailures,
}

impl std::fmt::Display for Bottleneck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bottleneck::Backlog => write!(f, "backlog"),
            Bottleneck::TaskFailures => write!(f, "task_failures"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub health: SystemHealth,
    /// Distinct directed agent pairs that talked last round over n(n-1)
    pub effectiveness: f64,
    pub bottlenecks: Vec<Bottleneck>,
}

/// Coordination effectiveness in [0, 1]; zero with fewer than two agents
pub fn coordination_effectiveness(state: &SystemState) -> f64 {
    let n = state.active_agents.len();
    if n < 2 {
        return 0.0;
    }
    let possible = (n * (n - 1)) as f64;
    (state.communication.distinct_agent_pairs as f64 / possible).min(1.0)
}

pub fn bottlenecks(state: &SystemState, config: &ControllerConfig) -> Vec<Bottleneck> {
    let mut found = Vec::new();
    if state.ledger.pending_len() > config.backlog_threshold {
        found.push(Bottleneck::Backlog);
    }
    if state.tasks.failure_ratio() > config.failure_ratio_threshold {
        found.push(Bottleneck::TaskFailures);
    }
    found
}

pub fn assess_health(state: &SystemState, config: &ControllerConfig) -> HealthReport {
    let effectiveness = coordination_effectiveness(state);
    let bottlenecks = bottlenecks(state, config);
    let health = if effectiveness > 0.7 && bottlenecks.is_empty() {
        SystemHealth::Excellent
    } else if effectiveness > 0.5 && bottlenecks.len() <= 1 {
        SystemHealth::Good
    } else if effectiveness > 0.3 {
        SystemHealth::Fair
    } else {
        SystemHealth::Poor
    };
    HealthReport {
        health,
        effectiveness,
        bottlenecks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::CoordinationStrategy;
    use crate::domain::{AgentKind, WorkItem};
    use crate::state::WorkLedger;

    fn state(pending: usize, pairs: usize) -> SystemState {
        let items = (0..pending).map(|i| WorkItem::new(format!("item-{i}")));
        let mut s = SystemState::new(
            AgentKind::ORDER,
            WorkLedger::from_items(items, 1000),
            CoordinationStrategy::Adaptive,
            10,
        );
        s.communication.distinct_agent_pairs = pairs;
        s
    }

    #[test]
    fn test_effectiveness_over_directed_pairs() {
        // three agents, six directed pairs
        assert!((coordination_effectiveness(&state(0, 3)) - 0.5).abs() < 1e-9);
        assert!((coordination_effectiveness(&state(0, 9)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_health_levels() {
        let config = ControllerConfig::default();
        assert_eq!(assess_health(&state(0, 6), &config).health, SystemHealth::Excellent);
        assert_eq!(assess_health(&state(0, 4), &config).health, SystemHealth::Good);
        assert_eq!(assess_health(&state(0, 2), &config).health, SystemHealth::Fair);
        assert_eq!(assess_health(&state(0, 0), &config).health, SystemHealth::Poor);
    }

    #[test]
    fn test_backlog_bottleneck_demotes_excellent() {
        let config = ControllerConfig::default();
        let report = assess_health(&state(25, 6), &config);
        assert_eq!(report.bottlenecks, vec![Bottleneck::Backlog]);
        assert_eq!(report.health, SystemHealth::Good);
    }
}
