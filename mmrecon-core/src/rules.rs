//! Business-rule filter: decides which rows take part in balance arithmetic.
//!
//! Applied in order:
//! 1. failed / rolled-back rows never posted and are excluded;
//! 2. repeated commission rows (same timestamp, amount and balance) are excluded;
//! 3. special kinds are tagged from the description;
//! 4. the survivors are stably sorted by (timestamp, debit-before-credit, balance).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

use crate::config::RulePatterns;
use crate::model::{SpecialKind, Transaction, TxStatus, to_cents};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExclusionReason {
    #[serde(rename = "failed-status")]
    FailedStatus,
    #[serde(rename = "rolled-back-status")]
    RolledBackStatus,
    #[serde(rename = "duplicate-commission")]
    DuplicateCommission,
}

/// A row removed before replay, kept so callers can see what was dropped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExcludedRow {
    pub transaction: Transaction,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub kept: Vec<Transaction>,
    pub excluded: Vec<ExcludedRow>,
}

/// Classify a description into one of the fixed special kinds.
///
/// Commission disbursement is checked first: its wording often also mentions
/// a reversal or allocation of the commission.
pub fn classify_description(description: &str, patterns: &RulePatterns) -> Option<SpecialKind> {
    if patterns.commission_disbursement.is_match(description) {
        Some(SpecialKind::CommissionDisbursement)
    } else if patterns.deallocation.is_match(description) {
        Some(SpecialKind::Deallocation)
    } else if patterns.rollback.is_match(description) {
        Some(SpecialKind::Rollback)
    } else if patterns.reversal.is_match(description) {
        Some(SpecialKind::Reversal)
    } else if patterns.failed.is_match(description) {
        Some(SpecialKind::Failed)
    } else {
        None
    }
}

pub fn apply_business_rules(txns: Vec<Transaction>, patterns: &RulePatterns) -> FilterOutcome {
    let mut out = FilterOutcome::default();
    let mut seen_commission = HashSet::new();

    for tx in txns {
        match tx.status {
            TxStatus::Failed => {
                out.excluded.push(ExcludedRow {
                    transaction: tx.with_special_kind(SpecialKind::Failed),
                    reason: ExclusionReason::FailedStatus,
                });
                continue;
            }
            TxStatus::RolledBack => {
                out.excluded.push(ExcludedRow {
                    transaction: tx.with_special_kind(SpecialKind::Failed),
                    reason: ExclusionReason::RolledBackStatus,
                });
                continue;
            }
            TxStatus::Success => {}
        }

        if patterns.commission.is_match(&tx.description) {
            let key = (
                tx.timestamp,
                to_cents(tx.signed_amount()),
                to_cents(tx.disclosed_balance),
            );
            if !seen_commission.insert(key) {
                warn!(id = %tx.id, timestamp = %tx.timestamp, "dropping repeated commission row");
                out.excluded.push(ExcludedRow {
                    transaction: tx.with_special_kind(SpecialKind::DuplicateCommission),
                    reason: ExclusionReason::DuplicateCommission,
                });
                continue;
            }
        }

        let tx = match classify_description(&tx.description, patterns) {
            Some(kind) => tx.with_special_kind(kind),
            None => tx,
        };
        out.kept.push(tx);
    }

    // Debit sorts before Credit (enum order), giving debits first within a timestamp.
    out.kept.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.direction.cmp(&b.direction))
            .then_with(|| a.disclosed_balance.total_cmp(&b.disclosed_balance))
    });

    out
}
