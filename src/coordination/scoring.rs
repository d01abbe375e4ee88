//! Strategy fitness scoring

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::strategy::CoordinationStrategy;
use crate::error::{DocketError, Result};

const TIE_EPSILON: f64 = 1e-9;

/// System load figures a strategy is scored against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessInputs {
    /// Pending work items
    pub backlog: usize,
    /// Failed share of resolved tasks
    pub failure_rate: f64,
    /// Recent message volume relative to capacity
    pub system_load: f64,
}

pub fn fitness(strategy: CoordinationStrategy, inputs: &FitnessInputs) -> f64 {
    let mut score = strategy.base_score();
    match strategy {
        CoordinationStrategy::Parallel => {
            if inputs.backlog > 10 {
                score += 0.1;
            } else if inputs.backlog < 3 {
                score -= 0.1;
            }
        }
        CoordinationStrategy::Sequential if inputs.failure_rate > 0.2 => score += 0.15,
        CoordinationStrategy::Adaptive if inputs.system_load < 0.8 => score += 0.05,
        _ => {}
    }
    score.min(1.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySelection {
    pub strategy: CoordinationStrategy,
    pub scores: BTreeMap<CoordinationStrategy, f64>,
}

/// Pick the fittest strategy. Ties keep `current`, otherwise the earliest
/// strategy in declaration order wins.
pub fn select_strategy(
    current: CoordinationStrategy,
    inputs: &FitnessInputs,
) -> Result<StrategySelection> {
    if !inputs.failure_rate.is_finite() || !inputs.system_load.is_finite() {
        return Err(DocketError::Coordination(format!(
            "non-finite fitness inputs: failure_rate={}, system_load={}",
            inputs.failure_rate, inputs.system_load
        )));
    }

    let scores: BTreeMap<_, _> = CoordinationStrategy::ALL
        .iter()
        .map(|s| (*s, fitness(*s, inputs)))
        .collect();
    let best = scores.values().copied().fold(f64::NEG_INFINITY, f64::max);

    let is_best = |s: &CoordinationStrategy| (best - scores[s]).abs() <= TIE_EPSILON;
    let strategy = if is_best(&current) {
        current
    } else {
        CoordinationStrategy::ALL
            .into_iter()
            .find(is_best)
            .ok_or_else(|| DocketError::Coordination("no strategy could be scored".into()))?
    };

    Ok(StrategySelection { strategy, scores })
}
