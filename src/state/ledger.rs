//! Work ledger: tracks every work item through pending, in-progress,
//! completed and failed. An item lives in exactly one set and only moves
//! forward, so it is processed at most once per run.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::WorkItem;
use crate::error::{DocketError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for WorkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkState::Pending => write!(f, "pending"),
            WorkState::InProgress => write!(f, "in_progress"),
            WorkState::Completed => write!(f, "completed"),
            WorkState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkLedger {
    /// Pending items in arrival order
    pending: Vec<WorkItem>,
    in_progress: BTreeSet<WorkItem>,
    completed: BTreeSet<WorkItem>,
    failed: BTreeSet<WorkItem>,
}

impl WorkLedger {
    /// Build a ledger from source items, dropping duplicates and keeping
    /// at most `max_items`
    pub fn from_items(items: impl IntoIterator<Item = WorkItem>, max_items: usize) -> Self {
        let mut seen = HashSet::new();
        let pending = items
            .into_iter()
            .filter(|item| seen.insert(item.clone()))
            .take(max_items)
            .collect();
        Self {
            pending,
            ..Default::default()
        }
    }

    /// Next `n` pending items without moving them
    pub fn next_batch(&self, n: usize) -> Vec<WorkItem> {
        self.pending.iter().take(n).cloned().collect()
    }

    pub fn state_of(&self, item: &WorkItem) -> Option<WorkState> {
        if self.in_progress.contains(item) {
            Some(WorkState::InProgress)
        } else if self.completed.contains(item) {
            Some(WorkState::Completed)
        } else if self.failed.contains(item) {
            Some(WorkState::Failed)
        } else if self.pending.contains(item) {
            Some(WorkState::Pending)
        } else {
            None
        }
    }

    pub fn start(&mut self, item: &WorkItem) -> Result<()> {
        let idx = self
            .pending
            .iter()
            .position(|p| p == item)
            .ok_or_else(|| self.bad_move(item, WorkState::InProgress))?;
        let item = self.pending.remove(idx);
        self.in_progress.insert(item);
        Ok(())
    }

    pub fn complete(&mut self, item: &WorkItem) -> Result<()> {
        if !self.in_progress.remove(item) {
            return Err(self.bad_move(item, WorkState::Completed));
        }
        self.completed.insert(item.clone());
        Ok(())
    }

    pub fn fail(&mut self, item: &WorkItem) -> Result<()> {
        if !self.in_progress.remove(item) {
            return Err(self.bad_move(item, WorkState::Failed));
        }
        self.failed.insert(item.clone());
        Ok(())
    }

    fn bad_move(&self, item: &WorkItem, to: WorkState) -> DocketError {
        let from = self
            .state_of(item)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        DocketError::InvalidStateTransition {
            from: format!("work item {item} {from}"),
            to: to.to_string(),
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_progress_len(&self) -> usize {
        self.in_progress.len()
    }

    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }

    pub fn failed_len(&self) -> usize {
        self.failed.len()
    }

    pub fn total(&self) -> usize {
        self.pending.len() + self.in_progress.len() + self.completed.len() + self.failed.len()
    }

    pub fn pending(&self) -> &[WorkItem] {
        &self.pending
    }

    pub fn in_progress(&self) -> impl Iterator<Item = &WorkItem> {
        self.in_progress.iter()
    }

    pub fn completed(&self) -> impl Iterator<Item = &WorkItem> {
        self.completed.iter()
    }

    pub fn failed(&self) -> impl Iterator<Item = &WorkItem> {
        self.failed.iter()
    }

    /// Nothing pending and nothing in flight
    pub fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.in_progress.is_empty()
    }

    /// failed / (completed + failed); zero before any item finishes
    pub fn failure_ratio(&self) -> f64 {
        let finished = self.completed.len() + self.failed.len();
        if finished == 0 {
            0.0
        } else {
            self.failed.len() as f64 / finished as f64
        }
    }

    /// Verify that no item appears in two sets
    pub fn check_invariants(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let all = self
            .pending
            .iter()
            .chain(self.in_progress.iter())
            .chain(self.completed.iter())
            .chain(self.failed.iter());
        for item in all {
            if !seen.insert(item) {
                return Err(DocketError::InvariantViolation(format!(
                    "work item {item} tracked in more than one set"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<WorkItem> {
        (0..n)
            .map(|i| WorkItem::new(format!("https://www.justice.gov/usao-sdny/pr/case-{i}")))
            .collect()
    }

    #[test]
    fn test_from_items_dedupes_and_truncates() {
        let mut source = items(3);
        source.push(source[0].clone());
        source.extend(items(6).into_iter().skip(3));
        let ledger = WorkLedger::from_items(source, 4);
        assert_eq!(ledger.pending_len(), 4);
        assert_eq!(ledger.pending()[3], items(4)[3]);
    }

    #[test]
    fn test_item_moves_forward_only() {
        let all = items(2);
        let mut ledger = WorkLedger::from_items(all.clone(), 10);

        ledger.start(&all[0]).unwrap();
        assert_eq!(ledger.state_of(&all[0]), Some(WorkState::InProgress));
        ledger.complete(&all[0]).unwrap();
        assert_eq!(ledger.state_of(&all[0]), Some(WorkState::Completed));

        assert!(ledger.start(&all[0]).is_err(), "completed item cannot restart");
        assert!(ledger.fail(&all[0]).is_err());
        assert!(ledger.complete(&all[1]).is_err(), "pending item cannot complete");

        ledger.start(&all[1]).unwrap();
        ledger.fail(&all[1]).unwrap();
        assert_eq!(ledger.failed_len(), 1);
        assert!(ledger.is_drained());
        assert_eq!(ledger.failure_ratio(), 0.5);
        ledger.check_invariants().unwrap();
    }

    #[test]
    fn test_next_batch_does_not_move() {
        let ledger = WorkLedger::from_items(items(7), 10);
        assert_eq!(ledger.next_batch(5).len(), 5);
        assert_eq!(ledger.pending_len(), 7);
        assert_eq!(ledger.next_batch(10).len(), 7);
    }

    #[test]
    fn test_failure_ratio_empty() {
        let ledger = WorkLedger::default();
        assert_eq!(ledger.failure_ratio(), 0.0);
        assert!(ledger.is_drained());
    }
}
