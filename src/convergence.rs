//! Convergence evaluation: decides whether another round is worth running

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ConvergenceConfig;
use crate::state::SystemState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    BacklogEmpty,
    MinCasesReached,
    EvaluationAvailable,
    MinRoundsReached,
    FailureRatioBelow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Continue,
    Finalize,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recommendation::Continue => write!(f, "continue"),
            Recommendation::Finalize => write!(f, "finalize"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceAssessment {
    pub criteria: BTreeMap<Criterion, bool>,
    /// Share of criteria met
    pub score: f64,
    pub recommendation: Recommendation,
    /// Rounds completed before the assessed one
    pub round: u64,
}

impl ConvergenceAssessment {
    pub fn should_finalize(&self) -> bool {
        self.recommendation == Recommendation::Finalize
    }
}

#[derive(Debug, Clone)]
pub struct ConvergenceEvaluator {
    config: ConvergenceConfig,
    max_rounds: u64,
}

impl ConvergenceEvaluator {
    pub fn new(config: ConvergenceConfig, max_rounds: u64) -> Self {
        Self { config, max_rounds }
    }

    pub fn assess(&self, state: &SystemState) -> ConvergenceAssessment {
        let criteria = BTreeMap::from([
            (Criterion::BacklogEmpty, state.ledger.pending_len() == 0),
            (
                Criterion::MinCasesReached,
                state.records.len() >= self.config.min_cases,
            ),
            (Criterion::EvaluationAvailable, !state.evaluations.is_empty()),
            (
                Criterion::MinRoundsReached,
                state.round >= self.config.min_rounds,
            ),
            (
                Criterion::FailureRatioBelow,
                state.ledger.failure_ratio() < self.config.max_failure_ratio,
            ),
        ]);
        let met = criteria.values().filter(|ok| **ok).count();
        let score = met as f64 / criteria.len() as f64;

        let round = state.round;
        let finalize = score >= self.config.finalize_score
            || round >= self.max_rounds
            || (score >= self.config.late_finalize_score
                && round >= self.max_rounds.saturating_sub(1));

        ConvergenceAssessment {
            criteria,
            score,
            recommendation: if finalize {
                Recommendation::Finalize
            } else {
                Recommendation::Continue
            },
            round,
        }
    }
}
