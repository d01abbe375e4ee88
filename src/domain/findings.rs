//! Typed outputs produced by the agent variants

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CaseRecord, WorkItem};

/// Scores returned by a performance evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScores {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub sample_size: usize,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyTrend {
    Improving,
    Stable,
    Declining,
    Unknown,
}

impl AccuracyTrend {
    /// Trend across the last three evaluations
    pub fn from_history(history: &[EvaluationScores]) -> Self {
        if history.len() < 3 {
            return AccuracyTrend::Unknown;
        }
        let recent = &history[history.len() - 3..];
        let delta = recent[2].accuracy - recent[0].accuracy;
        if delta > 0.02 {
            AccuracyTrend::Improving
        } else if delta < -0.02 {
            AccuracyTrend::Declining
        } else {
            AccuracyTrend::Stable
        }
    }
}

impl std::fmt::Display for AccuracyTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccuracyTrend::Improving => write!(f, "improving"),
            AccuracyTrend::Stable => write!(f, "stable"),
            AccuracyTrend::Declining => write!(f, "declining"),
            AccuracyTrend::Unknown => write!(f, "unknown"),
        }
    }
}

/// Fraud pattern summary over every record seen so far
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchSummary {
    pub total_records: usize,
    pub fraud_cases: usize,
    pub money_laundering_cases: usize,
    pub category_counts: BTreeMap<String, usize>,
    pub classified_records: usize,
}

impl ResearchSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a CaseRecord>) -> Self {
        let mut summary = ResearchSummary::default();
        for record in records {
            summary.total_records += 1;
            if record.is_fraud() {
                summary.fraud_cases += 1;
            }
            if record.is_money_laundering() {
                summary.money_laundering_cases += 1;
            }
            if record.classification.is_some() {
                summary.classified_records += 1;
            }
            for category in &record.charge_categories {
                *summary.category_counts.entry(category.clone()).or_insert(0) += 1;
            }
        }
        summary
    }

    /// Most frequent charge category, ties broken alphabetically
    pub fn dominant_category(&self) -> Option<&str> {
        self.category_counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(category, _)| category.as_str())
    }
}

/// Reference case used for precedent matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precedent {
    pub case_name: String,
    pub citation: String,
    pub year: i32,
    pub court: String,
    pub charges: Vec<String>,
    pub outcome: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecedentMatch {
    pub item: WorkItem,
    pub case_name: String,
    pub citation: String,
    pub relevance: f64,
}

/// Output of a legal-intelligence pass over recent records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegalFindings {
    pub analyzed_records: usize,
    pub precedent_matches: Vec<PrecedentMatch>,
    /// Jurisdictions with at least two cases
    pub jurisdiction_patterns: BTreeMap<String, usize>,
    /// Share of classified records whose language verdict agrees with keywords
    pub validation_rate: Option<f64>,
}
