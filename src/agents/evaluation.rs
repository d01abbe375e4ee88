//! Evaluation agent: scores the record set and reports accuracy trends

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::context::RoundContext;
use super::traits::{Agent, AgentDescriptor, AgentOutput, AgentUpdate};
use crate::collaborators::PerformanceEvaluator;
use crate::domain::{AccuracyTrend, AgentKind, TaskType};
use crate::error::{DocketError, ErrorRecord, Result};
use crate::memory::{LearnedPattern, MemoryDelta, SharedMemoryStore};
use crate::state::{CommunicationSnapshot, StateDelta, TaskOutcome};

/// Directed pairs possible among the three managed agents
const POSSIBLE_PAIRS: f64 = 6.0;

/// How well the agents talked to each other, judged from the communication log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinationReview {
    pub messages: usize,
    pub agent_pairs: usize,
    pub message_types: usize,
    /// Volume 0.3, pair diversity 0.4, type diversity 0.3
    pub effectiveness: f64,
    pub recommendations: Vec<String>,
}

impl CoordinationReview {
    pub fn from_snapshot(comm: &CommunicationSnapshot) -> Self {
        let volume = (comm.messages_retained as f64 / 20.0).min(1.0);
        let pairs = comm.distinct_agent_pairs as f64 / POSSIBLE_PAIRS;
        let types = (comm.message_types as f64 / 10.0).min(1.0);
        let effectiveness = (volume * 0.3 + pairs * 0.4 + types * 0.3).min(1.0);

        let mut recommendations = Vec::new();
        if comm.messages_retained < 5 {
            recommendations.push("increase inter-agent communication frequency".to_string());
        }
        if comm.distinct_agent_pairs < 3 {
            recommendations.push("improve agent-to-agent interaction patterns".to_string());
        }
        if comm.message_types < 3 {
            recommendations
                .push("diversify the types of information shared between agents".to_string());
        }
        if recommendations.is_empty() {
            recommendations.push("agent coordination is functioning well".to_string());
        }

        Self {
            messages: comm.messages_retained,
            agent_pairs: comm.distinct_agent_pairs,
            message_types: comm.message_types,
            effectiveness,
            recommendations,
        }
    }

    fn record(&self, memory: &mut MemoryDelta) {
        memory.learn(LearnedPattern::new("coordination_evaluation", json!(self)));
        memory.metric("coordination.effectiveness", self.effectiveness);
    }
}

pub struct EvaluationAgent {
    evaluator: Arc<dyn PerformanceEvaluator>,
}

impl EvaluationAgent {
    pub fn new(evaluator: Arc<dyn PerformanceEvaluator>) -> Self {
        Self { evaluator }
    }
}

#[async_trait]
impl Agent for EvaluationAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Evaluation
    }

    fn initialize_memory(&self, store: &mut SharedMemoryStore) {
        let memory = store.get_or_create_agent_memory(self.id());
        memory.remember(
            "capabilities",
            json!(["performance_evaluation"]),
            self.id(),
        );
        memory.remember("metrics", json!(["accuracy", "precision", "recall", "f1"]), self.id());
    }

    async fn process(&self, ctx: &RoundContext) -> Result<AgentUpdate> {
        let review = CoordinationReview::from_snapshot(&ctx.snapshot.communication);
        debug!(
            effectiveness = review.effectiveness,
            recommendations = ?review.recommendations,
            "coordination reviewed"
        );
        let mut memory = MemoryDelta::default();
        review.record(&mut memory);

        let tasks: Vec<_> = ctx.tasks_of(TaskType::PerformanceEvaluation).collect();
        if tasks.is_empty() {
            return Ok(AgentUpdate {
                memory,
                ..AgentUpdate::idle(self.kind())
            });
        }

        let mut state = StateDelta::default();
        let records = &ctx.snapshot.records;
        let started = Instant::now();

        let scored = if records.is_empty() {
            Err(DocketError::collaborator("evaluator", "no records to score"))
        } else {
            self.evaluator.score(records).await
        };

        let scores = match scored {
            Ok(scores) => scores,
            Err(e) => {
                warn!(error = %e, "evaluation failed");
                for t in &tasks {
                    state.task_outcomes.push(TaskOutcome::failed(
                        &t.id,
                        self.kind(),
                        None,
                        started.elapsed().as_secs_f64(),
                        e.to_string(),
                    ));
                }
                state.errors.push(ErrorRecord::from_error(self.id(), &e, ctx.round));
                return Ok(AgentUpdate {
                    agent: self.kind(),
                    state,
                    memory,
                    output: AgentOutput::Evaluation(None),
                });
            }
        };

        let mut history = ctx.snapshot.evaluations.clone();
        history.push(scores.clone());
        let trend = AccuracyTrend::from_history(&history);
        info!(
            accuracy = scores.accuracy,
            f1 = scores.f1,
            sample = scores.sample_size,
            trend = %trend,
            "evaluation complete"
        );

        let result = json!({
            "accuracy": scores.accuracy,
            "precision": scores.precision,
            "recall": scores.recall,
            "f1": scores.f1,
            "trend": trend.to_string(),
        });
        for t in &tasks {
            state.task_outcomes.push(TaskOutcome::succeeded(
                &t.id,
                self.kind(),
                None,
                started.elapsed().as_secs_f64(),
                Some(result.clone()),
            ));
        }
        // Accuracy measures the research pipeline's classifications
        state.accuracy.insert(AgentKind::Research, scores.accuracy);

        memory.learn(LearnedPattern::new("evaluation", result.clone()));
        memory.share_with(AgentKind::Research.id(), "evaluation_feedback", result.clone());
        memory.share_with(AgentKind::LegalIntelligence.id(), "evaluation_feedback", result);
        memory.metric("evaluation.accuracy", scores.accuracy);
        memory.metric("evaluation.f1", scores.f1);
        if trend == AccuracyTrend::Declining {
            memory.insight(format!(
                "classification accuracy declining, now {:.2}",
                scores.accuracy
            ));
        }

        Ok(AgentUpdate {
            agent: self.kind(),
            state,
            memory,
            output: AgentOutput::Evaluation(Some(scores)),
        })
    }

    fn describe(&self) -> AgentDescriptor {
        AgentDescriptor::new(self.kind(), vec![TaskType::PerformanceEvaluation])
    }
}
