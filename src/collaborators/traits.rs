//! Boundaries to the systems the engine consumes

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    CaseRecord, Classification, EvaluationScores, RawContent, StructuredInsight, WorkItem,
};
use crate::error::Result;

/// Supplies the backlog; called once at initialization
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkSource: Send + Sync {
    async fn list_work_items(&self) -> Result<Vec<WorkItem>>;
}

/// Fetches and classifies press-release content.
/// `Ok(None)` means the item yielded nothing usable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn fetch(&self, item: &WorkItem) -> Result<Option<RawContent>>;

    async fn classify(&self, content: &RawContent) -> Result<Option<CaseRecord>>;
}

/// Remote natural-language classification
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NaturalLanguageService: Send + Sync {
    async fn classify(&self, record: &CaseRecord) -> Result<Classification>;

    /// Turn free-text model rationale into structured insight
    fn parse_insights(&self, text: &str) -> StructuredInsight {
        StructuredInsight::from_text(text)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PerformanceEvaluator: Send + Sync {
    async fn score(&self, records: &[CaseRecord]) -> Result<EvaluationScores>;
}

/// Event forwarded to a feedback sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FeedbackEvent {
    RunCompleted {
        run_id: String,
        success: bool,
        rounds: u64,
        records: usize,
        failed_items: usize,
        at: DateTime<Utc>,
    },
    RecordFlagged {
        item: WorkItem,
        reason: String,
        at: DateTime<Utc>,
    },
}

/// Append-only sink; consumes events only
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn append(&self, event: FeedbackEvent) -> Result<()>;
}
