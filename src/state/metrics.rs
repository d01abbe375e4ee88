use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-agent performance tracked across rounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPerformanceMetrics {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub total_processing_secs: f64,
    pub avg_processing_secs: f64,
    /// Measured accuracy, when an evaluation exists for this agent's output
    pub accuracy: Option<f64>,
    pub last_active: Option<DateTime<Utc>>,
    recent_outcomes: VecDeque<bool>,
    window: usize,
}

impl AgentPerformanceMetrics {
    pub fn new(window: usize) -> Self {
        Self {
            tasks_completed: 0,
            tasks_failed: 0,
            total_processing_secs: 0.0,
            avg_processing_secs: 0.0,
            accuracy: None,
            last_active: None,
            recent_outcomes: VecDeque::with_capacity(window),
            window: window.max(1),
        }
    }

    pub fn record_outcome(&mut self, success: bool, elapsed_secs: f64, at: DateTime<Utc>) {
        if success {
            self.tasks_completed += 1;
        } else {
            self.tasks_failed += 1;
        }
        self.total_processing_secs += elapsed_secs.max(0.0);
        self.avg_processing_secs = self.total_processing_secs / self.total_tasks() as f64;
        self.last_active = Some(at);

        self.recent_outcomes.push_back(success);
        while self.recent_outcomes.len() > self.window {
            self.recent_outcomes.pop_front();
        }
    }

    pub fn total_tasks(&self) -> u64 {
        self.tasks_completed + self.tasks_failed
    }

    /// Success rate over the rolling window; `None` without history
    pub fn rolling_success_rate(&self) -> Option<f64> {
        if self.recent_outcomes.is_empty() {
            return None;
        }
        let ok = self.recent_outcomes.iter().filter(|s| **s).count();
        Some(ok as f64 / self.recent_outcomes.len() as f64)
    }

    pub fn has_history(&self) -> bool {
        !self.recent_outcomes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_window() {
        let mut metrics = AgentPerformanceMetrics::new(4);
        assert_eq!(metrics.rolling_success_rate(), None);

        let now = Utc::now();
        for success in [false, false, true, true, true, true] {
            metrics.record_outcome(success, 2.0, now);
        }
        assert_eq!(metrics.rolling_success_rate(), Some(1.0));
        assert_eq!(metrics.tasks_failed, 2);
        assert_eq!(metrics.tasks_completed, 4);
        assert_eq!(metrics.avg_processing_secs, 2.0);
    }
}
