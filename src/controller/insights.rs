//! Meta-level analysis attached to every coordination decision
//!
//! Per-agent performance alerts, system maturity and risk, and how well the
//! active strategy is doing. Everything here is a pure function of the
//! merged state, the in-flight workload and the recent strategy history.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::coordination::CoordinationStrategy;
use crate::domain::{AccuracyTrend, AgentKind};
use crate::state::SystemState;

const HIGH_FAILURE_RATE: f64 = 0.3;
const ACCURACY_TARGET: f64 = 0.9;
const COMMUNICATION_BASELINE: f64 = 15.0;
const EXPECTED_ROUND_MESSAGES: f64 = 20.0;
const OVERLOADED_ABOVE: usize = 3;
const UNDERLOADED_BELOW: usize = 1;
const STABILITY_WINDOW: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceAlert {
    pub agent: AgentKind,
    pub issue: String,
    pub adjustment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceMonitoring {
    pub alerts: Vec<PerformanceAlert>,
    /// More than one alert this round
    pub intervention_needed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemMaturity {
    #[default]
    Nascent,
    Developing,
    Mature,
}

impl std::fmt::Display for SystemMaturity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemMaturity::Nascent => write!(f, "nascent"),
            SystemMaturity::Developing => write!(f, "developing"),
            SystemMaturity::Mature => write!(f, "mature"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityForecast {
    Stable,
    /// Every recent decision used a different strategy
    Unstable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaInsights {
    pub maturity: SystemMaturity,
    pub opportunities: Vec<String>,
    pub recommendations: Vec<String>,
    /// Absent until enough decisions exist
    pub stability: Option<StabilityForecast>,
    pub failure_rate: f64,
    pub high_failure_rate: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rebalance {
    pub overloaded: Vec<AgentKind>,
    pub underloaded: Vec<AgentKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinationOptimization {
    /// Weighted performance of the strategy that ran last round
    pub current_performance: f64,
    /// Selected fitness minus current performance, on a strategy change
    pub projected_gain: Option<f64>,
    pub rebalance: Option<Rebalance>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaAnalysis {
    pub monitoring: PerformanceMonitoring,
    pub insights: MetaInsights,
    pub optimization: CoordinationOptimization,
}

impl MetaAnalysis {
    /// Lines worth surfacing as global insights, if any
    pub fn headlines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.monitoring.intervention_needed {
            let issues: Vec<String> = self
                .monitoring
                .alerts
                .iter()
                .map(|a| format!("{}: {}", a.agent, a.issue))
                .collect();
            lines.push(format!("intervention needed ({})", issues.join("; ")));
        }
        if self.insights.high_failure_rate {
            lines.push(format!(
                "high failure rate {:.2}; address failures before scaling up",
                self.insights.failure_rate
            ));
        }
        lines
    }
}

/// Inputs beyond the merged state
pub struct AnalysisInput<'a> {
    pub state: &'a SystemState,
    /// In-flight tasks per agent once this round's tasks are allocated
    pub workload: &'a BTreeMap<AgentKind, usize>,
    /// Strategies of the most recent recorded decisions, oldest first
    pub recent_strategies: &'a [CoordinationStrategy],
    pub selected: CoordinationStrategy,
    /// Fitness of the selected strategy, when scoring ran
    pub selected_score: Option<f64>,
}

pub fn analyze(input: &AnalysisInput<'_>) -> MetaAnalysis {
    let round = input.state.round + 1;
    MetaAnalysis {
        monitoring: monitor_agents(input.state, round),
        insights: meta_insights(input.state, round, input.recent_strategies),
        optimization: optimize(input),
    }
}

pub fn monitor_agents(state: &SystemState, round: u64) -> PerformanceMonitoring {
    let records = state.records.len();
    let mut alerts = Vec::new();
    let mut alert = |agent, issue: &str, adjustment: &str| {
        alerts.push(PerformanceAlert {
            agent,
            issue: issue.to_string(),
            adjustment: adjustment.to_string(),
        })
    };

    for agent in &state.active_agents {
        match agent {
            AgentKind::Research if records < 2 && round > 1 => alert(
                *agent,
                "low case analysis productivity",
                "increase processing focus",
            ),
            AgentKind::Evaluation
                if AccuracyTrend::from_history(&state.evaluations) == AccuracyTrend::Declining =>
            {
                alert(*agent, "declining accuracy trend", "review evaluation criteria")
            }
            AgentKind::LegalIntelligence
                if records > 5
                    && state
                        .legal_findings
                        .as_ref()
                        .map_or(0, |f| f.analyzed_records)
                        == 0 =>
            {
                alert(*agent, "no precedent analysis completed", "activate precedent analysis")
            }
            _ => {}
        }
    }

    let intervention_needed = alerts.len() > 1;
    PerformanceMonitoring {
        alerts,
        intervention_needed,
    }
}

fn failure_rate(state: &SystemState) -> f64 {
    let failed = state.ledger.failed_len();
    failed as f64 / (state.records.len() + failed).max(1) as f64
}

pub fn meta_insights(
    state: &SystemState,
    round: u64,
    recent_strategies: &[CoordinationStrategy],
) -> MetaInsights {
    let records = state.records.len();
    let maturity = if records > 20 && round > 3 {
        SystemMaturity::Mature
    } else if records > 10 && round > 2 {
        SystemMaturity::Developing
    } else {
        SystemMaturity::Nascent
    };

    let mut opportunities = Vec::new();
    if state.ledger.failed_len() > 0 {
        opportunities.push("improve item processing reliability".to_string());
    }
    if state
        .evaluations
        .last()
        .is_some_and(|e| e.accuracy < ACCURACY_TARGET)
    {
        opportunities.push("enhance fraud detection accuracy".to_string());
    }
    if (state.communication.messages_last_round as f64 / COMMUNICATION_BASELINE) < 0.5 {
        opportunities.push("increase inter-agent communication".to_string());
    }

    let mut recommendations = vec![match maturity {
        SystemMaturity::Mature => "focus on fine-tuning and optimization".to_string(),
        _ => "prioritize system stabilization and learning".to_string(),
    }];

    let stability = (recent_strategies.len() >= STABILITY_WINDOW).then(|| {
        let window = &recent_strategies[recent_strategies.len() - STABILITY_WINDOW..];
        let distinct: BTreeSet<_> = window.iter().collect();
        if distinct.len() > 2 {
            StabilityForecast::Unstable
        } else {
            StabilityForecast::Stable
        }
    });

    let failure_rate = failure_rate(state);
    let high_failure_rate = failure_rate > HIGH_FAILURE_RATE;
    if high_failure_rate {
        recommendations.push("address failure rate issues immediately".to_string());
    }

    MetaInsights {
        maturity,
        opportunities,
        recommendations,
        stability,
        failure_rate,
        high_failure_rate,
    }
}

/// Throughput 0.3, accuracy 0.4, efficiency 0.2, communication 0.1
pub fn strategy_performance(state: &SystemState) -> f64 {
    let records = state.records.len() as f64;
    let throughput = records / (state.ledger.pending_len() as f64 + records).max(1.0);
    let accuracy = state.evaluations.last().map_or(0.0, |e| e.accuracy);
    let efficiency = 1.0 - failure_rate(state);
    let communication = state.communication.messages_last_round as f64 / EXPECTED_ROUND_MESSAGES;
    (throughput * 0.3 + accuracy * 0.4 + efficiency * 0.2 + communication * 0.1).min(1.0)
}

fn optimize(input: &AnalysisInput<'_>) -> CoordinationOptimization {
    let current_performance = strategy_performance(input.state);
    let projected_gain = input
        .selected_score
        .filter(|_| input.selected != input.state.strategy)
        .map(|score| score - current_performance);

    let load = |agent: &AgentKind| input.workload.get(agent).copied().unwrap_or(0);
    let overloaded: Vec<AgentKind> = input
        .state
        .active_agents
        .iter()
        .filter(|a| load(a) > OVERLOADED_ABOVE)
        .copied()
        .collect();
    let underloaded: Vec<AgentKind> = input
        .state
        .active_agents
        .iter()
        .filter(|a| load(a) < UNDERLOADED_BELOW)
        .copied()
        .collect();
    let rebalance = (!overloaded.is_empty() && !underloaded.is_empty()).then_some(Rebalance {
        overloaded,
        underloaded,
    });

    CoordinationOptimization {
        current_performance,
        projected_gain,
        rebalance,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{CaseRecord, EvaluationScores, LegalFindings, WorkItem};
    use crate::state::WorkLedger;

    fn state(items: usize, records: usize, failed: usize) -> SystemState {
        let all: Vec<_> = (0..items).map(|i| WorkItem::new(format!("item-{i}"))).collect();
        let mut s = SystemState::new(
            AgentKind::ORDER,
            WorkLedger::from_items(all.clone(), 1000),
            CoordinationStrategy::Adaptive,
            10,
        );
        for (i, item) in all.iter().take(records + failed).enumerate() {
            s.ledger.start(item).unwrap();
            if i < records {
                s.ledger.complete(item).unwrap();
                s.records.push(CaseRecord::new(item.clone(), "case"));
            } else {
                s.ledger.fail(item).unwrap();
            }
        }
        s
    }

    fn scores(accuracy: f64) -> EvaluationScores {
        EvaluationScores {
            accuracy,
            precision: accuracy,
            recall: accuracy,
            f1: accuracy,
            sample_size: 5,
            evaluated_at: Utc::now(),
        }
    }

    #[test]
    fn test_two_alerts_need_intervention() {
        let mut s = state(20, 8, 0);
        s.evaluations = vec![scores(0.95), scores(0.9), scores(0.8)];
        let monitoring = monitor_agents(&s, 3);

        let agents: Vec<_> = monitoring.alerts.iter().map(|a| a.agent).collect();
        assert_eq!(agents, vec![AgentKind::LegalIntelligence, AgentKind::Evaluation]);
        assert!(monitoring.intervention_needed);
    }

    #[test]
    fn test_single_alert_is_not_an_intervention() {
        let s = state(10, 1, 0);
        let monitoring = monitor_agents(&s, 2);
        assert_eq!(monitoring.alerts.len(), 1);
        assert_eq!(monitoring.alerts[0].agent, AgentKind::Research);
        assert_eq!(monitoring.alerts[0].adjustment, "increase processing focus");
        assert!(!monitoring.intervention_needed);

        // the first round never flags research
        assert!(monitor_agents(&s, 1).alerts.is_empty());
    }

    #[test]
    fn test_legal_alert_clears_once_findings_exist() {
        let mut s = state(10, 7, 0);
        assert_eq!(monitor_agents(&s, 1).alerts.len(), 1);
        s.legal_findings = Some(LegalFindings {
            analyzed_records: 7,
            ..LegalFindings::default()
        });
        assert!(monitor_agents(&s, 1).alerts.is_empty());
    }

    #[test]
    fn test_maturity_thresholds() {
        assert_eq!(meta_insights(&state(30, 21, 0), 4, &[]).maturity, SystemMaturity::Mature);
        assert_eq!(meta_insights(&state(30, 21, 0), 3, &[]).maturity, SystemMaturity::Developing);
        assert_eq!(meta_insights(&state(30, 11, 0), 3, &[]).maturity, SystemMaturity::Developing);
        assert_eq!(meta_insights(&state(30, 10, 0), 5, &[]).maturity, SystemMaturity::Nascent);
    }

    #[test]
    fn test_failure_risk_flag_above_thirty_percent() {
        // 3 of 10 resolved items failed: exactly 0.3 is not a risk
        let at = meta_insights(&state(20, 7, 3), 2, &[]);
        assert!(!at.high_failure_rate);
        assert!(at
            .opportunities
            .contains(&"improve item processing reliability".to_string()));

        let above = meta_insights(&state(20, 6, 4), 2, &[]);
        assert!(above.high_failure_rate);
        assert!((above.failure_rate - 0.4).abs() < 1e-9);
        assert_eq!(above.recommendations.len(), 2);
    }

    #[test]
    fn test_stability_needs_three_decisions() {
        use CoordinationStrategy::*;
        let s = state(5, 0, 0);
        assert_eq!(meta_insights(&s, 1, &[Parallel, Sequential]).stability, None);
        assert_eq!(
            meta_insights(&s, 1, &[Adaptive, Parallel, Sequential]).stability,
            Some(StabilityForecast::Unstable)
        );
        assert_eq!(
            meta_insights(&s, 1, &[Parallel, Sequential, Adaptive, Adaptive]).stability,
            Some(StabilityForecast::Stable)
        );
    }

    #[test]
    fn test_strategy_performance_weights() {
        // 4 records, 4 pending, 1 failed, accuracy 0.5, 10 messages
        let mut s = state(9, 4, 1);
        s.evaluations.push(scores(0.5));
        s.communication.messages_last_round = 10;
        let expected = 0.5 * 0.3 + 0.5 * 0.4 + 0.8 * 0.2 + 0.5 * 0.1;
        assert!((strategy_performance(&s) - expected).abs() < 1e-9);

        s.communication.messages_last_round = 1_000;
        assert_eq!(strategy_performance(&s), 1.0);
    }

    #[test]
    fn test_rebalance_needs_both_extremes() {
        let s = state(10, 0, 0);
        let mut workload = BTreeMap::from([(AgentKind::Research, 5)]);
        let input = |workload: &BTreeMap<AgentKind, usize>| {
            analyze(&AnalysisInput {
                state: &s,
                workload,
                recent_strategies: &[],
                selected: CoordinationStrategy::Adaptive,
                selected_score: Some(0.9),
            })
        };

        let rebalance = input(&workload).optimization.rebalance.unwrap();
        assert_eq!(rebalance.overloaded, vec![AgentKind::Research]);
        assert_eq!(
            rebalance.underloaded,
            vec![AgentKind::LegalIntelligence, AgentKind::Evaluation]
        );

        workload.insert(AgentKind::LegalIntelligence, 1);
        workload.insert(AgentKind::Evaluation, 2);
        assert!(input(&workload).optimization.rebalance.is_none());
    }

    #[test]
    fn test_projected_gain_only_on_strategy_change() {
        let s = state(10, 0, 0);
        let workload = BTreeMap::new();
        let analysis = |selected| {
            analyze(&AnalysisInput {
                state: &s,
                workload: &workload,
                recent_strategies: &[],
                selected,
                selected_score: Some(0.9),
            })
        };
        assert_eq!(
            analysis(CoordinationStrategy::Adaptive).optimization.projected_gain,
            None
        );
        let gain = analysis(CoordinationStrategy::Parallel)
            .optimization
            .projected_gain
            .unwrap();
        // nothing done yet: only efficiency contributes
        assert!((gain - (0.9 - 0.2)).abs() < 1e-9);
    }

    #[test]
    fn test_headlines() {
        let mut analysis = MetaAnalysis::default();
        assert!(analysis.headlines().is_empty());
        analysis.insights.high_failure_rate = true;
        analysis.insights.failure_rate = 0.5;
        let lines = analysis.headlines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("0.50"));
    }
}
