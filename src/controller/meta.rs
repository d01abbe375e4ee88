//! MetaController
//!
//! Observes the merged state once per round and decides how the next round
//! runs. Planning is deterministic: task ids come from the state's sequence
//! counter and nothing here draws randomness.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{debug, info};

use super::allocation::{allocate_tasks, priority_adjustments, AllocationRequest};
use super::health::assess_health;
use super::insights::{analyze, AnalysisInput};
use super::{CoordinationDecision, RoundPlan, RoundPlanner};
use crate::agents::AgentDescriptor;
use crate::config::ControllerConfig;
use crate::coordination::{select_strategy, CoordinationStrategy, FitnessInputs, StrategyInput};
use crate::domain::{AgentKind, AgentMessage, AgentTask, MessageType, META_CONTROLLER_ID};
use crate::error::{DocketError, Result};
use crate::state::SystemState;

/// Allocation rules shared by the controller and the orchestrator's
/// planning fallback
#[derive(Debug, Clone, Default)]
pub struct PlanningRules {
    pub config: ControllerConfig,
    pub descriptors: BTreeMap<AgentKind, AgentDescriptor>,
    pub task_deadline: Option<Duration>,
}

impl PlanningRules {
    pub fn new(config: ControllerConfig, task_deadline: Option<Duration>) -> Self {
        Self {
            config,
            descriptors: BTreeMap::new(),
            task_deadline,
        }
    }

    pub fn with_descriptors(
        mut self,
        descriptors: impl IntoIterator<Item = AgentDescriptor>,
    ) -> Self {
        self.descriptors = descriptors.into_iter().map(|d| (d.kind, d)).collect();
        self
    }

    /// Hierarchical plan with batch size 4, used when planning fails
    pub fn fallback(&self, state: &SystemState, now: DateTime<Utc>, reason: &str) -> RoundPlan {
        self.assemble(
            state,
            now,
            CoordinationStrategy::Hierarchical,
            BTreeMap::new(),
            &[],
            true,
            format!("planning failed ({reason}); hierarchical fallback"),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        state: &SystemState,
        now: DateTime<Utc>,
        strategy: CoordinationStrategy,
        strategy_scores: BTreeMap<CoordinationStrategy, f64>,
        recent_strategies: &[CoordinationStrategy],
        fallback: bool,
        rationale: String,
    ) -> RoundPlan {
        let health = assess_health(state, &self.config);
        let priorities = priority_adjustments(state, &self.config);
        let batch_size = strategy.batch_size();

        let allocation = allocate_tasks(&AllocationRequest {
            state,
            config: &self.config,
            descriptors: &self.descriptors,
            batch_size,
            priorities: &priorities,
            deadline: self.task_deadline,
            now,
        });

        let mut in_flight = state.tasks.in_flight_counts();
        for task in &allocation.tasks {
            *in_flight.entry(task.target_agent).or_insert(0) += 1;
        }
        let mut execution = strategy.plan(&StrategyInput {
            agents: state.active_agents.iter().copied().collect(),
            in_flight: in_flight.clone(),
            priorities: priorities.clone(),
            adaptive_parallel: state.adaptive.is_parallel(),
        });
        execution.honour_dependencies(&allocation.tasks);

        let analysis = analyze(&AnalysisInput {
            state,
            workload: &in_flight,
            recent_strategies,
            selected: strategy,
            selected_score: strategy_scores.get(&strategy).copied(),
        });

        let decision = CoordinationDecision {
            round: state.round + 1,
            strategy,
            batch_size,
            health: health.health,
            effectiveness: health.effectiveness,
            bottlenecks: health.bottlenecks,
            strategy_scores,
            priority_adjustments: priorities,
            rationale,
            fallback,
            analysis,
            timestamp: now,
        };
        let guidance = guidance_messages(state, &decision, &allocation.tasks);

        RoundPlan {
            decision,
            tasks: allocation.tasks,
            execution,
            guidance,
            next_task_sequence: allocation.next_sequence,
        }
    }
}

fn guidance_messages(
    state: &SystemState,
    decision: &CoordinationDecision,
    tasks: &[AgentTask],
) -> Vec<AgentMessage> {
    let mut messages = Vec::new();
    for agent in &state.active_agents {
        messages.push(AgentMessage::new(
            META_CONTROLLER_ID,
            agent.id(),
            MessageType::MetaGuidance,
            "meta_guidance",
            json!({
                "round": decision.round,
                "strategy": decision.strategy.to_string(),
                "health": decision.health.to_string(),
                "priority": decision.priority_adjustments.get(agent).map(|p| p.to_string()),
            }),
        ));
    }
    for alert in &decision.analysis.monitoring.alerts {
        messages.push(AgentMessage::new(
            META_CONTROLLER_ID,
            alert.agent.id(),
            MessageType::PerformanceAdjustment,
            "performance_adjustment",
            json!({
                "round": decision.round,
                "issue": alert.issue,
                "adjustment": alert.adjustment,
                "intervention_needed": decision.analysis.monitoring.intervention_needed,
            }),
        ));
    }
    for agent in &state.active_agents {
        let ids: Vec<&str> = tasks
            .iter()
            .filter(|t| t.target_agent == *agent)
            .map(|t| t.id.as_str())
            .collect();
        if ids.is_empty() {
            continue;
        }
        messages.push(AgentMessage::new(
            META_CONTROLLER_ID,
            agent.id(),
            MessageType::TaskAssignment,
            "task_assignment",
            json!({ "round": decision.round, "tasks": ids }),
        ));
    }
    messages
}

pub struct MetaController {
    rules: PlanningRules,
    history: VecDeque<CoordinationDecision>,
}

impl MetaController {
    pub fn new(rules: PlanningRules) -> Self {
        Self {
            rules,
            history: VecDeque::new(),
        }
    }

    pub fn rules(&self) -> &PlanningRules {
        &self.rules
    }

    fn fitness_inputs(&self, state: &SystemState) -> FitnessInputs {
        FitnessInputs {
            backlog: state.ledger.pending_len(),
            failure_rate: state.tasks.failure_ratio(),
            system_load: state.communication.messages_last_round as f64
                / self.rules.config.load_message_capacity,
        }
    }
}

impl RoundPlanner for MetaController {
    fn plan_round(&mut self, state: &SystemState, now: DateTime<Utc>) -> Result<RoundPlan> {
        if state.active_agents.is_empty() {
            return Err(DocketError::Coordination(
                "no active agents to coordinate".to_string(),
            ));
        }

        let inputs = self.fitness_inputs(state);
        let selection = select_strategy(state.strategy, &inputs)?;
        let score = selection
            .scores
            .get(&selection.strategy)
            .copied()
            .unwrap_or_default();
        debug!(
            backlog = inputs.backlog,
            failure_rate = inputs.failure_rate,
            system_load = inputs.system_load,
            scores = ?selection.scores,
            "strategy fitness"
        );

        let rationale = format!(
            "{} scored {:.2} (backlog {}, failure rate {:.2}, load {:.2})",
            selection.strategy, score, inputs.backlog, inputs.failure_rate, inputs.system_load
        );
        let recent: Vec<CoordinationStrategy> = self.history.iter().map(|d| d.strategy).collect();
        let plan = self.rules.assemble(
            state,
            now,
            selection.strategy,
            selection.scores,
            &recent,
            false,
            rationale,
        );

        let analysis = &plan.decision.analysis;
        info!(
            round = plan.decision.round,
            strategy = %plan.decision.strategy,
            health = %plan.decision.health,
            maturity = %analysis.insights.maturity,
            alerts = analysis.monitoring.alerts.len(),
            tasks = plan.tasks.len(),
            "round planned"
        );
        Ok(plan)
    }

    fn record(&mut self, decision: CoordinationDecision) {
        self.history.push_back(decision);
        while self.history.len() > self.rules.config.decision_history_cap {
            self.history.pop_front();
        }
    }

    fn history(&self) -> Vec<CoordinationDecision> {
        self.history.iter().cloned().collect()
    }

    fn reset(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::StabilityForecast;
    use crate::domain::{CaseRecord, TaskType, WorkItem};
    use crate::state::WorkLedger;

    fn state(pending: usize, strategy: CoordinationStrategy) -> SystemState {
        let items = (0..pending).map(|i| WorkItem::new(format!("item-{i}")));
        SystemState::new(
            AgentKind::ORDER,
            WorkLedger::from_items(items, 1000),
            strategy,
            10,
        )
    }

    fn controller() -> MetaController {
        MetaController::new(PlanningRules::new(ControllerConfig::default(), None))
    }

    #[test]
    fn test_adaptive_kept_on_tie_with_parallel() {
        // backlog 12: parallel 0.90, adaptive 0.90 at low load
        let s = state(12, CoordinationStrategy::Adaptive);
        let plan = controller().plan_round(&s, Utc::now()).unwrap();
        assert_eq!(plan.decision.strategy, CoordinationStrategy::Adaptive);
        assert_eq!(plan.decision.batch_size, 5);
        assert_eq!(plan.tasks.len(), 5);
        assert_eq!(plan.decision.round, 1);
        assert!(!plan.decision.fallback);
    }

    #[test]
    fn test_tie_resolves_by_declaration_order_without_inertia() {
        let s = state(12, CoordinationStrategy::Sequential);
        let plan = controller().plan_round(&s, Utc::now()).unwrap();
        assert_eq!(plan.decision.strategy, CoordinationStrategy::Parallel);
    }

    #[test]
    fn test_same_state_same_strategy_across_rounds() {
        let mut meta = controller();
        let s = state(7, CoordinationStrategy::Adaptive);
        let mut next = s.clone();
        next.round += 1;
        let first = meta.plan_round(&s, Utc::now()).unwrap();
        let second = meta.plan_round(&next, Utc::now()).unwrap();
        assert_eq!(first.decision.strategy, second.decision.strategy);
        assert_eq!(first.decision.strategy_scores, second.decision.strategy_scores);
    }

    #[test]
    fn test_guidance_messages() {
        let s = state(3, CoordinationStrategy::Adaptive);
        let plan = controller().plan_round(&s, Utc::now()).unwrap();
        let guidance = plan
            .guidance
            .iter()
            .filter(|m| m.kind == MessageType::MetaGuidance)
            .count();
        let assignments: Vec<_> = plan
            .guidance
            .iter()
            .filter(|m| m.kind == MessageType::TaskAssignment)
            .collect();
        assert_eq!(guidance, 3);
        // only research has work before any record exists
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].to, AgentKind::Research.id());
        assert!(plan.guidance.iter().all(|m| m.from == META_CONTROLLER_ID));
    }

    #[test]
    fn test_no_active_agents_is_a_coordination_error() {
        let mut s = state(3, CoordinationStrategy::Adaptive);
        s.active_agents.clear();
        let err = controller().plan_round(&s, Utc::now()).unwrap_err();
        assert!(matches!(err, DocketError::Coordination(_)));
    }

    #[test]
    fn test_non_finite_load_fails_planning() {
        let mut config = ControllerConfig::default();
        config.load_message_capacity = 0.0;
        let mut meta = MetaController::new(PlanningRules::new(config, None));
        let mut s = state(3, CoordinationStrategy::Adaptive);
        s.communication.messages_last_round = 0;
        // 0 / 0 is NaN
        assert!(meta.plan_round(&s, Utc::now()).is_err());
    }

    #[test]
    fn test_fallback_plan_is_hierarchical_batch_four() {
        let rules = PlanningRules::new(ControllerConfig::default(), None);
        let s = state(10, CoordinationStrategy::Parallel);
        let plan = rules.fallback(&s, Utc::now(), "boom");
        assert!(plan.decision.fallback);
        assert_eq!(plan.decision.strategy, CoordinationStrategy::Hierarchical);
        assert_eq!(plan.decision.batch_size, 4);
        assert_eq!(
            plan.tasks
                .iter()
                .filter(|t| t.task_type == TaskType::UrlProcessing)
                .count(),
            4
        );
        assert_eq!(plan.execution.stages.len(), 3);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut config = ControllerConfig::default();
        config.decision_history_cap = 2;
        let mut meta = MetaController::new(PlanningRules::new(config, None));
        let s = state(3, CoordinationStrategy::Adaptive);
        for _ in 0..4 {
            let plan = meta.plan_round(&s, Utc::now()).unwrap();
            meta.record(plan.decision);
        }
        assert_eq!(meta.history().len(), 2);
    }

    #[test]
    fn test_evaluation_runs_after_the_research_it_scores() {
        let mut s = state(12, CoordinationStrategy::Parallel);
        let done: Vec<WorkItem> = s.ledger.next_batch(5);
        for item in done {
            s.ledger.start(&item).unwrap();
            s.ledger.complete(&item).unwrap();
            s.records.push(CaseRecord::new(item, "case"));
        }
        let plan = controller().plan_round(&s, Utc::now()).unwrap();

        assert!(plan
            .tasks
            .iter()
            .any(|t| t.target_agent == AgentKind::Evaluation && !t.dependencies.is_empty()));
        let stage_of = |kind| plan.execution.stages.iter().position(|st| st.contains(&kind));
        assert!(stage_of(AgentKind::Evaluation) > stage_of(AgentKind::Research));
    }

    #[test]
    fn test_alerts_become_adjustment_messages() {
        let mut s = state(6, CoordinationStrategy::Adaptive);
        let item = s.ledger.next_batch(1).remove(0);
        s.ledger.start(&item).unwrap();
        s.ledger.complete(&item).unwrap();
        s.records.push(CaseRecord::new(item, "case"));
        s.advance_round();

        let plan = controller().plan_round(&s, Utc::now()).unwrap();
        let alerts = &plan.decision.analysis.monitoring.alerts;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].agent, AgentKind::Research);
        let adjustments: Vec<_> = plan
            .guidance
            .iter()
            .filter(|m| m.kind == MessageType::PerformanceAdjustment)
            .collect();
        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[0].to, AgentKind::Research.id());
        assert_eq!(adjustments[0].payload["adjustment"], "increase processing focus");
    }

    #[test]
    fn test_stability_forecast_uses_recorded_history() {
        let mut meta = controller();
        let s = state(12, CoordinationStrategy::Adaptive);
        for _ in 0..3 {
            let plan = meta.plan_round(&s, Utc::now()).unwrap();
            assert_eq!(plan.decision.analysis.insights.stability, None);
            meta.record(plan.decision);
        }
        let plan = meta.plan_round(&s, Utc::now()).unwrap();
        assert_eq!(
            plan.decision.analysis.insights.stability,
            Some(StabilityForecast::Stable)
        );

        let fallback = meta.rules().fallback(&s, Utc::now(), "boom");
        assert_eq!(fallback.decision.analysis.insights.stability, None);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut meta = controller();
        let s = state(3, CoordinationStrategy::Adaptive);
        let plan = meta.plan_round(&s, Utc::now()).unwrap();
        meta.record(plan.decision);
        meta.reset();
        assert!(meta.history().is_empty());
    }
}
