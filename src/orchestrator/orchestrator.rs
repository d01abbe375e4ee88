//! Orchestrator
//!
//! Owns the system state, the shared memory store, the planner and the
//! agents, and drives rounds through the workflow state machine until the
//! run converges or hits its round limits. Agents only ever see snapshots;
//! every write goes through a merge here.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use futures::FutureExt;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::handle::{OrchestratorHandle, OrchestratorStatus};
use super::report::{AgentSummary, CoordinationMetrics, RunReport};
use super::workflow::{Workflow, WorkflowPhase};
use crate::agents::{
    Agent, EvaluationAgent, LegalIntelligenceAgent, ResearchAgent, RoundContext,
};
use crate::collaborators::{
    AgreementEvaluator, Extractor, FeedbackEvent, FeedbackSink, NaturalLanguageService,
    PerformanceEvaluator, SimulatedExtractor, SimulatedLanguageService, SimulatedWorkSource,
    TracingFeedbackSink, WorkSource,
};
use crate::config::AppConfig;
use crate::controller::{MetaController, PlanningRules, RoundPlan, RoundPlanner};
use crate::convergence::{ConvergenceAssessment, ConvergenceEvaluator};
use crate::coordination::CoordinationStrategy;
use crate::domain::{AgentKind, META_CONTROLLER_ID};
use crate::error::{DocketError, ErrorKind, ErrorRecord, Result};
use crate::memory::SharedMemoryStore;
use crate::state::{AgentStatus, CommunicationSnapshot, SystemState, WorkLedger};

/// External systems a fully wired orchestrator talks to
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn WorkSource>,
    pub extractor: Arc<dyn Extractor>,
    pub language: Arc<dyn NaturalLanguageService>,
    pub evaluator: Arc<dyn PerformanceEvaluator>,
    pub feedback: Option<Arc<dyn FeedbackSink>>,
}

impl Collaborators {
    /// In-process collaborators driven by `config.simulation`
    pub fn simulated(config: &AppConfig, items: usize) -> Self {
        Self {
            source: Arc::new(SimulatedWorkSource::new(items)),
            extractor: Arc::new(SimulatedExtractor::new(&config.simulation)),
            language: Arc::new(SimulatedLanguageService::new(&config.simulation)),
            evaluator: Arc::new(AgreementEvaluator),
            feedback: Some(Arc::new(TracingFeedbackSink)),
        }
    }
}

/// Per-run bookkeeping that only feeds the report
#[derive(Default)]
struct RunTally {
    strategy_usage: BTreeMap<CoordinationStrategy, u64>,
    fallback_rounds: u64,
}

pub struct Orchestrator {
    config: AppConfig,
    source: Arc<dyn WorkSource>,
    agents: BTreeMap<AgentKind, Arc<dyn Agent>>,
    planner: Option<Box<dyn RoundPlanner>>,
    rules: PlanningRules,
    convergence: ConvergenceEvaluator,
    store: Arc<RwLock<SharedMemoryStore>>,
    feedback: Option<Arc<dyn FeedbackSink>>,
    handle: OrchestratorHandle,
    workflow: Workflow,
    /// Start of the previous round; agents see inbox messages since then
    inbox_since: Option<DateTime<Utc>>,
}

impl Orchestrator {
    pub fn new(config: AppConfig, source: Arc<dyn WorkSource>) -> Self {
        let deadline = config
            .orchestrator
            .task_deadline_secs
            .map(|secs| Duration::seconds(secs.min(u64::from(u32::MAX)) as i64));
        let rules = PlanningRules::new(config.controller.clone(), deadline);
        let convergence =
            ConvergenceEvaluator::new(config.convergence.clone(), config.orchestrator.max_rounds);
        let store = Arc::new(RwLock::new(SharedMemoryStore::new(config.memory.clone())));
        Self {
            config,
            source,
            agents: BTreeMap::new(),
            planner: None,
            rules,
            convergence,
            store,
            feedback: None,
            handle: OrchestratorHandle::default(),
            workflow: Workflow::default(),
            inbox_since: None,
        }
    }

    /// Orchestrator with the three standard agents wired to `collaborators`
    pub fn from_collaborators(config: AppConfig, collaborators: Collaborators) -> Self {
        let timeout = StdDuration::from_millis(config.orchestrator.collaborator_timeout_ms);
        let mut orchestrator = Self::new(config, collaborators.source)
            .with_agent(Arc::new(ResearchAgent::new(
                collaborators.extractor,
                collaborators.language,
                timeout,
            )))
            .with_agent(Arc::new(LegalIntelligenceAgent::with_default_precedents()))
            .with_agent(Arc::new(EvaluationAgent::new(collaborators.evaluator)));
        if let Some(sink) = collaborators.feedback {
            orchestrator = orchestrator.with_feedback_sink(sink);
        }
        orchestrator
    }

    pub fn simulated(config: AppConfig, items: usize) -> Self {
        let collaborators = Collaborators::simulated(&config, items);
        Self::from_collaborators(config, collaborators)
    }

    /// Register an agent, replacing any agent of the same kind
    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        let kind = agent.kind();
        self.rules.descriptors.insert(kind, agent.describe());
        self.agents.insert(kind, agent);
        self
    }

    pub fn with_planner(mut self, planner: Box<dyn RoundPlanner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn with_feedback_sink(mut self, sink: Arc<dyn FeedbackSink>) -> Self {
        self.feedback = Some(sink);
        self
    }

    pub fn handle(&self) -> OrchestratorHandle {
        self.handle.clone()
    }

    pub fn memory(&self) -> Arc<RwLock<SharedMemoryStore>> {
        Arc::clone(&self.store)
    }

    /// Run the workflow over at most `max_items` work items. Never fails:
    /// fatal errors end the run with `success = false`.
    pub async fn run(&mut self, max_items: usize) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        info!(run_id = %run_id, max_items, agents = self.agents.len(), "run starting");

        self.workflow = Workflow::default();
        self.inbox_since = None;
        let mut planner: Box<dyn RoundPlanner> = match self.planner.take() {
            Some(planner) => planner,
            None => Box::new(MetaController::new(self.rules.clone())),
        };
        // Memory and decision history live for one run
        planner.reset();
        *self.store.write().await = SharedMemoryStore::new(self.config.memory.clone());
        let mut state = SystemState::new(
            self.agents.keys().copied(),
            WorkLedger::default(),
            self.config.strategy.initial,
            self.config.strategy.success_window,
        );
        let mut tally = RunTally::default();
        let mut assessment = None;
        let mut success = true;

        if let Err(e) = self.initialize(&mut state, max_items).await {
            self.abort(&mut state, &e);
            success = false;
        } else {
            loop {
                match self
                    .run_round(&mut state, planner.as_mut(), &mut tally)
                    .await
                {
                    Ok(latest) => {
                        let finalize = self.should_finalize(&state, &latest);
                        assessment = Some(latest);
                        if finalize {
                            break;
                        }
                        if let Err(e) = self.workflow.advance(WorkflowPhase::Coordinate) {
                            self.abort(&mut state, &e);
                            success = false;
                            break;
                        }
                    }
                    Err(e) => {
                        self.abort(&mut state, &e);
                        success = false;
                        break;
                    }
                }
            }
        }

        let report = self
            .finalize(run_id, state, planner.as_ref(), success, assessment, tally)
            .await;
        self.planner = Some(planner);
        info!(
            success = report.success,
            rounds = report.rounds,
            records = report.records.len(),
            errors = report.error_log.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run finished"
        );
        report
    }

    async fn initialize(&mut self, state: &mut SystemState, max_items: usize) -> Result<()> {
        let items = self.source.list_work_items().await?;
        let offered = items.len();
        state.ledger = WorkLedger::from_items(items, max_items);
        info!(offered, accepted = state.ledger.total(), "backlog loaded");

        {
            let mut store = self.store.write().await;
            for (kind, agent) in &self.agents {
                agent.initialize_memory(&mut store);
                state.set_status(*kind, AgentStatus::Idle);
            }
        }

        self.workflow.advance(WorkflowPhase::Plan)?;
        self.publish(state).await;
        Ok(())
    }

    fn should_finalize(&self, state: &SystemState, assessment: &ConvergenceAssessment) -> bool {
        let max_rounds = self.config.orchestrator.max_rounds;
        let cap = self.config.orchestrator.safety_round_cap;
        if assessment.should_finalize() {
            info!(score = assessment.score, "converged");
            true
        } else if state.round >= max_rounds {
            info!(rounds = state.round, max_rounds, "round limit reached");
            true
        } else if state.round >= cap {
            warn!(rounds = state.round, cap, "safety round cap reached");
            true
        } else {
            false
        }
    }

    /// One full Plan → Execute → Evaluate pass
    async fn run_round(
        &mut self,
        state: &mut SystemState,
        planner: &mut dyn RoundPlanner,
        tally: &mut RunTally,
    ) -> Result<ConvergenceAssessment> {
        if self.workflow.phase() == WorkflowPhase::Coordinate {
            self.workflow.advance(WorkflowPhase::Plan)?;
        }
        let round_started = Utc::now();
        let messages_before = self.store.read().await.messages_recorded();

        // Plan
        let plan = self.plan(state, planner, round_started);
        planner.record(plan.decision.clone());
        *tally.strategy_usage.entry(plan.decision.strategy).or_insert(0) += 1;
        if plan.decision.fallback {
            tally.fallback_rounds += 1;
        }
        state.strategy = plan.decision.strategy;
        state.task_sequence = plan.next_task_sequence;
        for task in plan.tasks {
            state.tasks.enqueue(task)?;
        }
        {
            let mut store = self.store.write().await;
            for message in plan.guidance {
                store.record_message(message);
            }
            for headline in plan.decision.analysis.headlines() {
                warn!(round = plan.decision.round, headline = %headline, "meta analysis");
                store.add_global_insight(META_CONTROLLER_ID, headline);
            }
        }

        // Execute
        self.workflow.advance(WorkflowPhase::Execute)?;
        self.publish(state).await;
        for stage in &plan.execution.stages {
            self.execute_stage(state, stage).await?;
        }

        // Evaluate: the round barrier
        self.workflow.advance(WorkflowPhase::Evaluate)?;
        let overdue = state.resolve_barrier(Utc::now())?;
        if !overdue.is_empty() {
            warn!(count = overdue.len(), "tasks failed at the barrier past their deadline");
        }
        state.check_invariants()?;

        {
            let mut store = self.store.write().await;
            let ids: Vec<&str> = state.active_agents.iter().map(|a| a.id()).collect();
            let messages = store.messages_recorded().saturating_sub(messages_before);
            let summary = store.summarize_communications();
            state.communication = CommunicationSnapshot {
                messages_last_round: messages as usize,
                distinct_agent_pairs: store.distinct_pairs_among(&ids),
                messages_retained: summary.total,
                message_types: summary.type_histogram.len(),
            };
            store.update_metric("round.messages", messages as f64);
            store.update_metric("ledger.completed", state.ledger.completed_len() as f64);
            store.update_metric("ledger.failed", state.ledger.failed_len() as f64);
        }

        let switched = state.adaptive.observe(
            state.min_success_rate(),
            self.config.strategy.adaptive_promote_threshold,
            self.config.strategy.adaptive_confirm_rounds,
        );
        if switched {
            info!(parallel = state.adaptive.is_parallel(), "adaptive mode switched");
        }

        let assessment = self.convergence.assess(state);
        let round = state.advance_round();
        self.inbox_since = Some(round_started);
        info!(
            round,
            strategy = %state.strategy,
            score = assessment.score,
            recommendation = %assessment.recommendation,
            pending = state.ledger.pending_len(),
            completed = state.ledger.completed_len(),
            failed = state.ledger.failed_len(),
            "round complete"
        );
        self.publish(state).await;
        Ok(assessment)
    }

    fn plan(
        &self,
        state: &mut SystemState,
        planner: &mut dyn RoundPlanner,
        now: DateTime<Utc>,
    ) -> RoundPlan {
        match planner.plan_round(state, now) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "planning failed, falling back to hierarchical");
                state.record_error(ErrorRecord::new(
                    ErrorKind::CoordinationError,
                    META_CONTROLLER_ID,
                    e.to_string(),
                    state.round,
                ));
                self.rules.fallback(state, now, &e.to_string())
            }
        }
    }

    /// Run one stage's agents concurrently against a shared snapshot, then
    /// merge their updates in stage order
    async fn execute_stage(&self, state: &mut SystemState, stage: &[AgentKind]) -> Result<()> {
        let now = Utc::now();
        let mut dispatched = Vec::with_capacity(stage.len());
        for kind in stage {
            let Some(agent) = self.agents.get(kind) else {
                continue;
            };
            let tasks = state.dispatch(*kind, now)?;
            dispatched.push((Arc::clone(agent), tasks));
        }

        let snapshot = Arc::new(state.clone());
        let contexts: Vec<(Arc<dyn Agent>, RoundContext)> = {
            let store = self.store.read().await;
            dispatched
                .into_iter()
                .map(|(agent, tasks)| {
                    let kind = agent.kind();
                    let ctx = RoundContext {
                        agent: kind,
                        round: snapshot.round,
                        snapshot: Arc::clone(&snapshot),
                        tasks,
                        memory: store.view_for(kind.id(), self.inbox_since),
                        started_at: now,
                    };
                    (agent, ctx)
                })
                .collect()
        };

        let results = join_all(contexts.iter().map(|(agent, ctx)| {
            debug!(agent = %ctx.agent, tasks = ctx.tasks.len(), "agent processing");
            AssertUnwindSafe(agent.process(ctx)).catch_unwind()
        }))
        .await;

        for ((_, ctx), result) in contexts.iter().zip(results) {
            let kind = ctx.agent;
            match result {
                Ok(Ok(update)) => {
                    let (delta, memory) = update.into_deltas();
                    state.merge(delta, Utc::now())?;
                    self.store.write().await.apply(kind.id(), memory);
                    state.set_status(kind, AgentStatus::Idle);
                }
                Ok(Err(e)) => self.agent_failed(state, kind, e.to_string()),
                Err(payload) => self.agent_failed(state, kind, panic_message(payload)),
            }
        }
        Ok(())
    }

    fn agent_failed(&self, state: &mut SystemState, kind: AgentKind, reason: String) {
        error!(agent = %kind, reason = %reason, "agent failed this round");
        let err = DocketError::agent(kind.id(), reason);
        state.record_error(ErrorRecord::from_error(kind.id(), &err, state.round));
        state.set_status(kind, AgentStatus::Error);
    }

    fn abort(&mut self, state: &mut SystemState, err: &DocketError) {
        error!(error = %err, phase = %self.workflow.phase(), "fatal orchestrator error");
        state.record_error(ErrorRecord::new(
            ErrorKind::FatalOrchestratorError,
            "orchestrator",
            err.to_string(),
            state.round,
        ));
    }

    async fn finalize(
        &mut self,
        run_id: String,
        state: SystemState,
        planner: &dyn RoundPlanner,
        success: bool,
        final_assessment: Option<ConvergenceAssessment>,
        tally: RunTally,
    ) -> RunReport {
        if !self.workflow.phase().is_terminal() {
            if let Err(e) = self.workflow.advance(WorkflowPhase::Finalize) {
                warn!(error = %e, "could not enter finalize");
            }
        }

        let fraud_cases = state.records.iter().filter(|r| r.is_fraud()).count();
        let summary = format!(
            "run {run_id} finished after {} rounds: {} records, {} fraud cases, {} failed items",
            state.round,
            state.records.len(),
            fraud_cases,
            state.ledger.failed_len()
        );
        let (insights, communication) = {
            let mut store = self.store.write().await;
            store.add_global_insight(META_CONTROLLER_ID, summary);
            (
                store.global_insights().cloned().collect::<Vec<_>>(),
                store.summarize_communications(),
            )
        };
        self.publish(&state).await;

        if let Some(sink) = &self.feedback {
            let now = Utc::now();
            let mut events: Vec<FeedbackEvent> = state
                .records
                .iter()
                .filter_map(|r| {
                    let c = r.classification.as_ref()?;
                    (c.fraud_flag != r.keyword_fraud_flag).then(|| FeedbackEvent::RecordFlagged {
                        item: r.item.clone(),
                        reason: format!(
                            "language verdict {} disagrees with keyword verdict {}",
                            c.fraud_flag, r.keyword_fraud_flag
                        ),
                        at: now,
                    })
                })
                .collect();
            events.push(FeedbackEvent::RunCompleted {
                run_id: run_id.clone(),
                success,
                rounds: state.round,
                records: state.records.len(),
                failed_items: state.ledger.failed_len(),
                at: now,
            });
            for event in events {
                if let Err(e) = sink.append(event).await {
                    warn!(error = %e, "feedback sink rejected event");
                }
            }
        }

        let messages_total = self.store.read().await.messages_recorded();
        let agents = state
            .performance
            .iter()
            .map(|(kind, m)| {
                (
                    *kind,
                    AgentSummary {
                        tasks_completed: m.tasks_completed,
                        tasks_failed: m.tasks_failed,
                        avg_processing_secs: m.avg_processing_secs,
                        accuracy: m.accuracy,
                    },
                )
            })
            .collect();
        let coordination_metrics = CoordinationMetrics {
            items_total: state.ledger.total(),
            items_completed: state.ledger.completed_len(),
            items_failed: state.ledger.failed_len(),
            items_pending: state.ledger.pending_len(),
            tasks_completed: state.tasks.completed().len(),
            tasks_failed: state.tasks.failed().len(),
            messages_total,
            distinct_pairs: communication.distinct_pairs,
            message_types: communication.type_histogram,
            strategy_usage: tally.strategy_usage,
            fallback_rounds: tally.fallback_rounds,
            agents,
        };

        RunReport {
            run_id,
            records: state.records,
            coordination_metrics,
            decision_history: planner.history(),
            success,
            error_log: state.errors,
            rounds: state.round,
            final_assessment,
            insights,
        }
    }

    async fn publish(&self, state: &SystemState) {
        let message_count = self.store.read().await.messages_recorded();
        self.handle
            .publish(OrchestratorStatus {
                active_strategy: state.strategy,
                rounds_completed: state.round,
                message_count,
                phase: self.workflow.phase(),
            })
            .await;
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::MockWorkSource;
    use crate::controller::MockRoundPlanner;
    use crate::domain::WorkItem;

    fn items(n: usize) -> Vec<WorkItem> {
        (0..n).map(SimulatedWorkSource::item).collect()
    }

    fn quiet_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.simulation.latency_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_planner_failure_falls_back_to_hierarchical() {
        let config = quiet_config();
        let mut planner = MockRoundPlanner::new();
        planner
            .expect_plan_round()
            .returning(|_, _| Err(DocketError::Coordination("scoring unavailable".into())));
        let recorded = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&recorded);
        planner.expect_record().returning(move |d| {
            sink.lock().unwrap().push(d);
        });
        planner
            .expect_history()
            .returning(Vec::new);
        planner.expect_reset().times(1).return_const(());

        let collaborators = Collaborators::simulated(&config, 10);
        let mut orchestrator = Orchestrator::from_collaborators(config, collaborators)
            .with_planner(Box::new(planner));
        let report = orchestrator.run(10).await;

        let decisions = recorded.lock().unwrap().clone();
        assert!(!decisions.is_empty());
        assert!(decisions.iter().all(|d| d.fallback
            && d.strategy == CoordinationStrategy::Hierarchical
            && d.batch_size == 4));
        assert!(report
            .error_log
            .iter()
            .any(|e| e.kind == ErrorKind::CoordinationError));
        assert_eq!(report.coordination_metrics.fallback_rounds, report.rounds);
        assert!(report.success);
    }

    #[tokio::test]
    async fn test_work_source_failure_is_fatal() {
        let mut source = MockWorkSource::new();
        source
            .expect_list_work_items()
            .returning(|| Err(DocketError::collaborator("source", "index unreachable")));
        let mut orchestrator = Orchestrator::new(quiet_config(), Arc::new(source));

        let report = orchestrator.run(5).await;
        assert!(!report.success);
        assert_eq!(report.rounds, 0);
        assert_eq!(
            report.error_log.last().map(|e| e.kind),
            Some(ErrorKind::FatalOrchestratorError)
        );
        assert_eq!(
            orchestrator.handle().status().await.phase,
            WorkflowPhase::Finalize
        );
    }

    #[tokio::test]
    async fn test_max_items_truncates_backlog() {
        let mut source = MockWorkSource::new();
        source.expect_list_work_items().returning(|| Ok(items(20)));
        let config = quiet_config();
        let collaborators = Collaborators {
            source: Arc::new(source),
            ..Collaborators::simulated(&config, 0)
        };
        let mut orchestrator = Orchestrator::from_collaborators(config, collaborators);
        let report = orchestrator.run(4).await;
        assert_eq!(report.coordination_metrics.items_total, 4);
        assert_eq!(report.records.len(), 4);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload), "panicked: boom");
    }
}
