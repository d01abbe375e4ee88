//! Research agent: turns work items into case records
//!
//! For each URL task it fetches content, classifies it by keyword through the
//! extractor, then asks the language service for a verdict under a timeout.
//! A missing or failed fetch/classify fails the task. A language-service
//! timeout or malformed answer keeps the record unclassified and is logged.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;
use tracing::{debug, warn};

use super::context::RoundContext;
use super::traits::{Agent, AgentDescriptor, AgentOutput, AgentUpdate};
use crate::collaborators::{Extractor, NaturalLanguageService};
use crate::domain::{AgentKind, AgentTask, CaseRecord, ResearchSummary, TaskType};
use crate::error::{DocketError, ErrorKind, ErrorRecord, Result};
use crate::memory::{LearnedPattern, MemoryDelta, SharedMemoryStore};
use crate::state::{StateDelta, TaskOutcome};

pub struct ResearchAgent {
    extractor: Arc<dyn Extractor>,
    language: Arc<dyn NaturalLanguageService>,
    classify_timeout: Duration,
}

/// Outcome of processing one URL task
struct ItemResult {
    outcome: TaskOutcome,
    record: Option<CaseRecord>,
    errors: Vec<ErrorRecord>,
}

impl ResearchAgent {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        language: Arc<dyn NaturalLanguageService>,
        classify_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            language,
            classify_timeout,
        }
    }

    async fn process_task(&self, task: &AgentTask, round: u64) -> ItemResult {
        let started = Instant::now();
        let item = task.work_item().cloned();
        let kind = self.kind();

        let Some(work_item) = item.clone() else {
            return ItemResult {
                outcome: TaskOutcome::failed(&task.id, kind, None, 0.0, "task carries no work item"),
                record: None,
                errors: vec![ErrorRecord::new(
                    ErrorKind::CollaboratorFailure,
                    self.id(),
                    format!("task {} carries no work item", task.id),
                    round,
                )],
            };
        };

        let extracted = async {
            let content = self
                .extractor
                .fetch(&work_item)
                .await?
                .ok_or_else(|| DocketError::collaborator("extractor", format!("no content for {work_item}")))?;
            self.extractor
                .classify(&content)
                .await?
                .ok_or_else(|| DocketError::collaborator("extractor", format!("no case in {work_item}")))
        }
        .await;

        let record = match extracted {
            Ok(record) => record,
            Err(e) => {
                warn!(item = %work_item, error = %e, "extraction failed");
                return ItemResult {
                    outcome: TaskOutcome::failed(
                        &task.id,
                        kind,
                        item,
                        started.elapsed().as_secs_f64(),
                        e.to_string(),
                    ),
                    record: None,
                    errors: vec![ErrorRecord::from_error(self.id(), &e, round)],
                };
            }
        };

        let mut errors = Vec::new();
        let classified =
            match tokio::time::timeout(self.classify_timeout, self.language.classify(&record)).await
            {
                Ok(Ok(classification)) => record.with_classification(classification),
                Ok(Err(e)) => {
                    warn!(item = %work_item, error = %e, "language classification failed");
                    errors.push(ErrorRecord::new(
                        ErrorKind::CollaboratorFailure,
                        self.id(),
                        format!("language service: {e}"),
                        round,
                    ));
                    record
                }
                Err(_) => {
                    warn!(item = %work_item, timeout_ms = self.classify_timeout.as_millis() as u64, "language classification timed out");
                    errors.push(ErrorRecord::from_error(
                        self.id(),
                        &DocketError::Timeout(format!("language service on {work_item}")),
                        round,
                    ));
                    record
                }
            };

        let result = json!({
            "record_id": classified.id,
            "fraud": classified.is_fraud(),
            "classified": classified.classification.is_some(),
        });
        ItemResult {
            outcome: TaskOutcome::succeeded(
                &task.id,
                kind,
                item,
                started.elapsed().as_secs_f64(),
                Some(result),
            ),
            record: Some(classified),
            errors,
        }
    }
}

#[async_trait]
impl Agent for ResearchAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Research
    }

    fn initialize_memory(&self, store: &mut SharedMemoryStore) {
        let memory = store.get_or_create_agent_memory(self.id());
        memory.remember(
            "capabilities",
            json!(["url_processing", "pattern_analysis"]),
            self.id(),
        );
        memory.remember(
            "fraud_categories",
            json!(crate::domain::keywords::FRAUD_KEYWORDS
                .iter()
                .map(|(category, _)| *category)
                .collect::<Vec<_>>()),
            self.id(),
        );
    }

    async fn process(&self, ctx: &RoundContext) -> Result<AgentUpdate> {
        let url_tasks: Vec<&AgentTask> = ctx.tasks_of(TaskType::UrlProcessing).collect();
        if url_tasks.is_empty() {
            return Ok(AgentUpdate::idle(self.kind()));
        }

        let results = join_all(url_tasks.iter().map(|t| self.process_task(t, ctx.round))).await;

        let mut state = StateDelta::default();
        for result in results {
            state.task_outcomes.push(result.outcome);
            state.records.extend(result.record);
            state.errors.extend(result.errors);
        }

        let summary = ResearchSummary::from_records(
            ctx.snapshot.records.iter().chain(state.records.iter()),
        );
        debug!(
            round = ctx.round,
            new_records = state.records.len(),
            total = summary.total_records,
            "research pass complete"
        );

        let mut memory = MemoryDelta::default();
        let insight_payload = json!({
            "round": ctx.round,
            "fraud_cases": summary.fraud_cases,
            "money_laundering_cases": summary.money_laundering_cases,
            "category_counts": summary.category_counts,
            "dominant_category": summary.dominant_category(),
        });
        memory.learn(LearnedPattern::new("fraud_patterns", insight_payload.clone()));
        memory.share_with(AgentKind::Evaluation.id(), "pattern_insights", insight_payload.clone());
        memory.share_with(AgentKind::LegalIntelligence.id(), "pattern_insights", insight_payload);

        for record in &state.records {
            let Some(rationale) = record.classification.as_ref().and_then(|c| c.rationale.as_deref()) else {
                continue;
            };
            let parsed = self.language.parse_insights(rationale);
            memory.insight_points(&record.title, parsed);
        }

        if let Some(feedback) = ctx
            .memory
            .shared_from(AgentKind::Evaluation.id(), "evaluation_feedback")
        {
            memory.remember("latest_evaluation_feedback", feedback.clone());
        }
        memory.metric("research.records", summary.total_records as f64);

        Ok(AgentUpdate {
            agent: self.kind(),
            state,
            memory,
            output: AgentOutput::Research(summary),
        })
    }

    fn describe(&self) -> AgentDescriptor {
        AgentDescriptor::new(
            self.kind(),
            vec![TaskType::UrlProcessing, TaskType::PatternAnalysis],
        )
    }
}
