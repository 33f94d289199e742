//! Duplicate detection over the filtered transaction list.

use chrono::NaiveDateTime;
use std::collections::HashSet;

use crate::model::{IdReliability, Transaction, to_cents};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IdentityKey<'a> {
    /// Vendor id plus the visible content of the row.
    ById {
        id: &'a str,
        timestamp: NaiveDateTime,
        amount: i64,
        description: &'a str,
    },
    /// Fallback when ids cannot be trusted.
    ByBalance {
        timestamp: NaiveDateTime,
        amount: i64,
        balance: i64,
    },
}

fn identity_key(tx: &Transaction, ids: IdReliability) -> IdentityKey<'_> {
    let amount = to_cents(tx.signed_amount());
    if ids == IdReliability::Reliable && !tx.id.is_empty() {
        IdentityKey::ById {
            id: &tx.id,
            timestamp: tx.timestamp,
            amount,
            description: &tx.description,
        }
    } else {
        IdentityKey::ByBalance {
            timestamp: tx.timestamp,
            amount,
            balance: to_cents(tx.disclosed_balance),
        }
    }
}

/// Flag each transaction that repeats an earlier one. Index-aligned with `txns`.
pub fn detect_duplicates(txns: &[Transaction], ids: IdReliability) -> Vec<bool> {
    let mut seen = HashSet::with_capacity(txns.len());
    txns.iter()
        .map(|tx| !seen.insert(identity_key(tx, ids)))
        .collect()
}
