//! Segmented balance replay.
//!
//! Walks the resolved rows once, carrying a running balance and recording the
//! divergence from each disclosed balance. Restart markers bound how far an
//! arithmetic error can propagate: the row after a marker starts from the
//! marker's disclosed balance.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::{FeeMode, LedgerRow, SpecialKind, round_cents, to_cents};

/// Per-row replay output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconciliationResult {
    pub id: String,
    pub timestamp: NaiveDateTime,
    pub disclosed_balance: f64,
    pub replayed_balance: f64,
    /// replayed - disclosed
    pub divergence: f64,
    pub is_duplicate: bool,
    pub special_kind: Option<SpecialKind>,
    /// Cumulative count of divergence changes up to and including this row
    pub divergence_change_count: usize,
}

/// Change this row applies to the running balance.
pub fn balance_delta(row: &LedgerRow, fees: FeeMode) -> f64 {
    if row.is_duplicate {
        return 0.0;
    }
    match row.tx.special_kind {
        None => row.tx.effect(fees),
        // Internal wallet transfer: its visible effect here is opposite to its direction.
        Some(SpecialKind::CommissionDisbursement) => -row.tx.effect(fees),
        Some(
            SpecialKind::Deallocation
            | SpecialKind::Rollback
            | SpecialKind::Reversal
            | SpecialKind::Failed
            | SpecialKind::DuplicateCommission,
        ) => 0.0,
    }
}

/// Whether the row after this one restarts from this row's disclosed balance.
pub fn resyncs_after(row: &LedgerRow) -> bool {
    !row.is_duplicate && row.tx.special_kind.is_some_and(SpecialKind::is_restart_marker)
}

/// Balance before the first row, derived from its own disclosed balance and effect.
pub fn opening_balance(first: &LedgerRow, fees: FeeMode) -> f64 {
    round_cents(first.tx.disclosed_balance - balance_delta(first, fees))
}

/// Mutable accumulator threaded through one statement's replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayState {
    pub running_balance: f64,
    pub last_divergence: f64,
    pub divergence_change_count: usize,
    resync_to: Option<f64>,
}

impl ReplayState {
    pub fn new(opening_balance: f64) -> Self {
        Self {
            running_balance: round_cents(opening_balance),
            last_divergence: 0.0,
            divergence_change_count: 0,
            resync_to: None,
        }
    }

    pub fn step(&mut self, row: &LedgerRow, fees: FeeMode) -> ReconciliationResult {
        if let Some(balance) = self.resync_to.take() {
            self.running_balance = balance;
        }

        let replayed = round_cents(self.running_balance + balance_delta(row, fees));
        let divergence = if row.is_duplicate || row.tx.special_kind.is_some() {
            self.last_divergence
        } else {
            round_cents(replayed - row.tx.disclosed_balance)
        };

        if to_cents(divergence) != to_cents(self.last_divergence) {
            self.divergence_change_count += 1;
        }
        self.running_balance = replayed;
        self.last_divergence = divergence;
        if resyncs_after(row) {
            self.resync_to = Some(round_cents(row.tx.disclosed_balance));
        }

        ReconciliationResult {
            id: row.tx.id.clone(),
            timestamp: row.tx.timestamp,
            disclosed_balance: row.tx.disclosed_balance,
            replayed_balance: replayed,
            divergence,
            is_duplicate: row.is_duplicate,
            special_kind: row.tx.special_kind,
            divergence_change_count: self.divergence_change_count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Replay {
    pub opening_balance: f64,
    pub results: Vec<ReconciliationResult>,
    pub state: ReplayState,
}

pub fn replay(rows: &[LedgerRow], fees: FeeMode) -> Replay {
    let opening = rows.first().map_or(0.0, |r| opening_balance(r, fees));
    let mut state = ReplayState::new(opening);
    let results = rows.iter().map(|row| state.step(row, fees)).collect();
    Replay {
        opening_balance: opening,
        results,
        state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Transaction;
    use chrono::NaiveDate;

    fn at(m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(8, m, 0)
            .unwrap()
    }

    fn row(id: &str, m: u32, amount: f64, balance: f64) -> LedgerRow {
        LedgerRow {
            tx: Transaction::new(id, at(m), "Transfer", amount, balance),
            is_duplicate: false,
        }
    }

    fn special(mut r: LedgerRow, kind: SpecialKind) -> LedgerRow {
        r.tx = r.tx.with_special_kind(kind);
        r
    }

    #[test]
    fn test_consistent_statement_replays_to_zero_divergence() {
        let rows = vec![
            row("A", 0, 500.0, 1500.0),
            row("B", 1, -200.0, 1300.0),
            row("C", 2, -0.35, 1299.65),
        ];
        let out = replay(&rows, FeeMode::Embedded);
        assert_eq!(out.opening_balance, 1000.0);
        assert!(out.results.iter().all(|r| r.divergence == 0.0));
        assert_eq!(out.state.running_balance, 1299.65);
        assert_eq!(out.state.divergence_change_count, 0);
    }

    #[test]
    fn test_separate_fees_are_deducted() {
        let mut b = row("B", 1, -200.0, 1290.0);
        b.tx = b.tx.with_fee(10.0);
        let rows = vec![row("A", 0, 500.0, 1500.0), b];
        let out = replay(&rows, FeeMode::Separate);
        assert_eq!(out.results[1].replayed_balance, 1290.0);
        assert_eq!(out.results[1].divergence, 0.0);
    }

    #[test]
    fn test_commission_disbursement_inverts_sign_and_keeps_divergence() {
        let mut state = ReplayState::new(900.0);
        // Brings the running balance to 1000 with a divergence of 5.
        let first = state.step(&row("A", 0, 100.0, 995.0), FeeMode::Embedded);
        assert_eq!(first.divergence, 5.0);
        assert_eq!(state.running_balance, 1000.0);

        let commission = special(row("C", 1, -50.0, 950.0), SpecialKind::CommissionDisbursement);
        let out = state.step(&commission, FeeMode::Embedded);
        assert_eq!(state.running_balance, 1050.0);
        assert_eq!(out.replayed_balance, 1050.0);
        assert_eq!(out.divergence, 5.0);
        assert_eq!(out.divergence_change_count, 1);
    }

    #[test]
    fn test_duplicate_carries_balance_and_divergence() {
        let mut dup = row("B", 1, -200.0, 1300.0);
        dup.is_duplicate = true;
        let rows = vec![row("A", 0, 500.0, 1500.0), dup, row("C", 2, -100.0, 1400.0)];
        let out = replay(&rows, FeeMode::Embedded);
        assert_eq!(out.results[1].replayed_balance, 1500.0);
        assert_eq!(out.results[1].divergence, 0.0);
        assert_eq!(out.results[2].divergence, 0.0);
    }

    #[test]
    fn test_restart_marker_resyncs_next_row() {
        let rows = vec![
            row("A", 0, 500.0, 1500.0),
            // Reversal returns 200 on the statement; replay leaves balance as is.
            special(row("R", 1, 200.0, 1700.0), SpecialKind::Reversal),
            row("B", 2, -100.0, 1600.0),
        ];
        let out = replay(&rows, FeeMode::Embedded);
        assert_eq!(out.results[1].replayed_balance, 1500.0);
        assert_eq!(out.results[1].divergence, 0.0);
        // Restarted from the reversal's disclosed 1700.
        assert_eq!(out.results[2].replayed_balance, 1600.0);
        assert_eq!(out.results[2].divergence, 0.0);
        assert_eq!(out.state.divergence_change_count, 0);
    }

    #[test]
    fn test_duplicate_after_restart_marker_takes_the_resync() {
        let mut dup = row("A", 2, 500.0, 1500.0);
        dup.is_duplicate = true;
        let rows = vec![
            row("A", 0, 500.0, 1500.0),
            special(row("R", 1, 200.0, 1700.0), SpecialKind::Reversal),
            dup,
            row("B", 3, -100.0, 1600.0),
        ];
        let out = replay(&rows, FeeMode::Embedded);
        // The duplicate consumes the restart: it lands on the marker's balance
        // and keeps the prior divergence.
        assert_eq!(out.results[2].replayed_balance, 1700.0);
        assert_eq!(out.results[2].divergence, 0.0);
        assert_eq!(out.results[3].replayed_balance, 1600.0);
        assert_eq!(out.results[3].divergence, 0.0);
        assert_eq!(out.state.divergence_change_count, 0);
    }

    #[test]
    fn test_failed_kind_passes_through_without_resync() {
        let rows = vec![
            row("A", 0, 500.0, 1500.0),
            special(row("F", 1, -300.0, 1200.0), SpecialKind::Failed),
            row("B", 2, -100.0, 1400.0),
        ];
        let out = replay(&rows, FeeMode::Embedded);
        assert_eq!(out.results[1].replayed_balance, 1500.0);
        assert_eq!(out.results[2].replayed_balance, 1400.0);
        assert_eq!(out.results[2].divergence, 0.0);
    }

    #[test]
    fn test_divergence_changes_counted() {
        let rows = vec![
            row("A", 0, 500.0, 1500.0),
            row("B", 1, -200.0, 1290.0), // +10
            row("C", 2, -100.0, 1190.0), // still +10
            row("D", 3, -100.0, 1100.0), // back to 0
        ];
        let out = replay(&rows, FeeMode::Embedded);
        let counts: Vec<_> = out.results.iter().map(|r| r.divergence_change_count).collect();
        assert_eq!(counts, vec![0, 1, 1, 2]);
        assert_eq!(out.results[1].divergence, 10.0);
    }

    #[test]
    fn test_opening_balance_for_commission_first_row() {
        let first = special(row("C", 0, -50.0, 1050.0), SpecialKind::CommissionDisbursement);
        assert_eq!(opening_balance(&first, FeeMode::Embedded), 1000.0);
    }
}
