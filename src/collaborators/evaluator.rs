use async_trait::async_trait;
use chrono::Utc;

use super::traits::PerformanceEvaluator;
use crate::domain::{CaseRecord, EvaluationScores};
use crate::error::{DocketError, Result};

/// Scores language verdicts against the keyword flags.
///
/// The keyword flag is treated as the label and the language service's fraud
/// flag as the prediction. Only classified records are scored.
#[derive(Debug, Clone, Default)]
pub struct AgreementEvaluator;

#[derive(Debug, Default, Clone, Copy)]
struct Confusion {
    tp: usize,
    fp: usize,
    tn: usize,
    fn_: usize,
}

impl Confusion {
    fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    fn ratio(num: usize, den: usize) -> f64 {
        if den == 0 {
            0.0
        } else {
            num as f64 / den as f64
        }
    }
}

#[async_trait]
impl PerformanceEvaluator for AgreementEvaluator {
    async fn score(&self, records: &[CaseRecord]) -> Result<EvaluationScores> {
        let mut m = Confusion::default();
        for record in records {
            let Some(classification) = &record.classification else {
                continue;
            };
            match (record.keyword_fraud_flag, classification.fraud_flag) {
                (true, true) => m.tp += 1,
                (false, true) => m.fp += 1,
                (false, false) => m.tn += 1,
                (true, false) => m.fn_ += 1,
            }
        }

        if m.total() == 0 {
            return Err(DocketError::collaborator(
                "evaluator",
                "no classified records to score",
            ));
        }

        let accuracy = Confusion::ratio(m.tp + m.tn, m.total());
        let precision = Confusion::ratio(m.tp, m.tp + m.fp);
        let recall = Confusion::ratio(m.tp, m.tp + m.fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(EvaluationScores {
            accuracy,
            precision,
            recall,
            f1,
            sample_size: m.total(),
            evaluated_at: Utc::now(),
        })
    }
}
