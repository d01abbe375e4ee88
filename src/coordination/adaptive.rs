use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hysteresis for the Adaptive strategy's sequential/parallel mode.
/// A mode change needs the same reading on consecutive observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveTracker {
    parallel: bool,
    candidate: bool,
    candidate_count: u32,
}

impl AdaptiveTracker {
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Feed the lowest rolling success rate across agents with history.
    /// Returns true when the mode switched.
    pub fn observe(&mut self, min_success_rate: Option<f64>, threshold: f64, confirm: u32) -> bool {
        let Some(rate) = min_success_rate else {
            return false;
        };

        let wants_parallel = rate > threshold;
        if wants_parallel == self.candidate {
            self.candidate_count = self.candidate_count.saturating_add(1);
        } else {
            self.candidate = wants_parallel;
            self.candidate_count = 1;
        }

        if self.candidate != self.parallel && self.candidate_count >= confirm {
            self.parallel = self.candidate;
            debug!(
                parallel = self.parallel,
                rate, threshold, "adaptive mode transition confirmed"
            );
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_needs_confirmation() {
        let mut tracker = AdaptiveTracker::default();
        assert!(!tracker.observe(Some(0.9), 0.8, 2));
        assert!(!tracker.is_parallel());
        assert!(tracker.observe(Some(0.95), 0.8, 2));
        assert!(tracker.is_parallel());
    }

    #[test]
    fn test_flapping_reading_does_not_switch() {
        let mut tracker = AdaptiveTracker::default();
        for rate in [0.9, 0.5, 0.9, 0.5, 0.9] {
            tracker.observe(Some(rate), 0.8, 2);
            assert!(!tracker.is_parallel());
        }
    }

    #[test]
    fn test_demotion_is_symmetric() {
        let mut tracker = AdaptiveTracker::default();
        tracker.observe(Some(1.0), 0.8, 2);
        tracker.observe(Some(1.0), 0.8, 2);
        assert!(tracker.is_parallel());

        assert!(!tracker.observe(Some(0.5), 0.8, 2));
        assert!(tracker.is_parallel());
        assert!(tracker.observe(Some(0.6), 0.8, 2));
        assert!(!tracker.is_parallel());
    }

    #[test]
    fn test_no_history_is_ignored() {
        let mut tracker = AdaptiveTracker::default();
        tracker.observe(Some(0.9), 0.8, 2);
        assert!(!tracker.observe(None, 0.8, 2));
        assert!(tracker.observe(Some(0.9), 0.8, 2));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let mut tracker = AdaptiveTracker::default();
        tracker.observe(Some(0.8), 0.8, 1);
        assert!(!tracker.is_parallel());
    }
}
