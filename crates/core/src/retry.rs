//! Consecutive-failure tracking and quarantine.
//!
//! A loan that fails `QUARANTINE_THRESHOLD` times in a row is no longer
//! attempted. Quarantine only ends with a successful liquidation or a manual
//! [`RetryTracker::clear`]; it never expires on its own.

use dashmap::DashMap;

use crate::position::LoanId;

/// Consecutive failures after which a loan is skipped.
pub const QUARANTINE_THRESHOLD: u32 = 5;

/// Quarantine predicate on a failure count.
#[inline]
pub fn is_quarantined(failures: u32) -> bool {
    failures >= QUARANTINE_THRESHOLD
}

/// Per-loan consecutive failure counter.
///
/// Entries are independent; outcome tasks for different loans may update the
/// tracker concurrently and in any order.
#[derive(Debug, Default)]
pub struct RetryTracker {
    failures: DashMap<LoanId, u32>,
}

impl RetryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current failure count (zero when absent).
    pub fn failures(&self, loan_id: &LoanId) -> u32 {
        self.failures.get(loan_id).map(|count| *count).unwrap_or(0)
    }

    /// Record a failed attempt. Returns the new count.
    pub fn record_failure(&self, loan_id: LoanId) -> u32 {
        let mut count = self.failures.entry(loan_id).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Record a successful liquidation, resetting the counter.
    pub fn record_success(&self, loan_id: &LoanId) {
        self.failures.remove(loan_id);
    }

    /// Whether the loan is quarantined.
    pub fn is_quarantined(&self, loan_id: &LoanId) -> bool {
        is_quarantined(self.failures(loan_id))
    }

    /// Manually clear a loan's history. Returns the previous count.
    pub fn clear(&self, loan_id: &LoanId) -> Option<u32> {
        self.failures.remove(loan_id).map(|(_, count)| count)
    }

    /// All quarantined loans with their failure counts.
    pub fn quarantined(&self) -> Vec<(LoanId, u32)> {
        self.failures
            .iter()
            .filter(|entry| is_quarantined(*entry.value()))
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }
}
