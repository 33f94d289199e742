//! Same-timestamp order resolver.
//!
//! Vendors expose no sub-second sequence, so rows sharing a timestamp arrive in
//! an arbitrary order. Each batch is reordered to the permutation whose
//! predicted balances agree with the disclosed ones most often. Batches are
//! resolved left to right and never revisited.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ReconConfig;
use crate::model::{FeeMode, LedgerRow, round_cents, to_cents};
use crate::replay::{balance_delta, opening_balance, resyncs_after};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStrategy {
    #[serde(rename = "single")]
    Single,
    #[serde(rename = "exhaustive")]
    Exhaustive,
    /// Batch too large to search; sorted by descending disclosed balance.
    #[serde(rename = "descending-balance")]
    DescendingBalance,
}

/// Chosen order for one batch, as indices into the provisional order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOrder {
    pub order: Vec<usize>,
    pub score: usize,
    pub strategy: OrderStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchResolution {
    pub timestamp: NaiveDateTime,
    pub size: usize,
    pub score: usize,
    pub strategy: OrderStrategy,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub rows: Vec<LedgerRow>,
    pub batches: Vec<BatchResolution>,
}

impl Resolution {
    pub fn heuristic_batches(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| b.strategy == OrderStrategy::DescendingBalance)
            .count()
    }
}

fn matches(predicted: f64, disclosed: f64, tolerance: f64) -> bool {
    to_cents((predicted - disclosed).abs()) < to_cents(tolerance).max(1)
}

/// Number of rows whose predicted balance matches the disclosed one.
///
/// `carried` is the balance entering the batch; `None` derives an opening
/// balance from the first row of this particular order.
pub fn score_order(
    batch: &[&LedgerRow],
    carried: Option<f64>,
    fees: FeeMode,
    tolerance: f64,
) -> usize {
    let Some(first) = batch.first() else {
        return 0;
    };
    let mut running = carried.unwrap_or_else(|| opening_balance(first, fees));
    let mut score = 0;
    for row in batch {
        let predicted = round_cents(running + balance_delta(row, fees));
        if matches(predicted, row.tx.disclosed_balance, tolerance) {
            score += 1;
        }
        running = if resyncs_after(row) {
            row.tx.disclosed_balance
        } else {
            predicted
        };
    }
    score
}

/// Advance to the next lexicographic permutation; false once exhausted.
fn next_permutation(p: &mut [usize]) -> bool {
    if p.len() < 2 {
        return false;
    }
    let mut i = p.len() - 1;
    while i > 0 && p[i - 1] >= p[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = p.len() - 1;
    while p[j] <= p[i - 1] {
        j -= 1;
    }
    p.swap(i - 1, j);
    p[i..].reverse();
    true
}

fn score_indices(
    batch: &[LedgerRow],
    order: &[usize],
    carried: Option<f64>,
    fees: FeeMode,
    tolerance: f64,
) -> usize {
    let rows: Vec<&LedgerRow> = order.iter().map(|&i| &batch[i]).collect();
    score_order(&rows, carried, fees, tolerance)
}

/// Pick the best order for one same-timestamp batch.
///
/// Ties keep the earliest permutation in lexicographic order, which starts
/// from the provisional order.
pub fn resolve_batch(
    batch: &[LedgerRow],
    carried: Option<f64>,
    fees: FeeMode,
    cfg: &ReconConfig,
) -> BatchOrder {
    let tolerance = cfg.match_tolerance;
    let mut order: Vec<usize> = (0..batch.len()).collect();

    if batch.len() <= 1 {
        let score = score_indices(batch, &order, carried, fees, tolerance);
        return BatchOrder {
            order,
            score,
            strategy: OrderStrategy::Single,
        };
    }

    if batch.len() > cfg.max_permutation_batch {
        order.sort_by(|&a, &b| {
            batch[b]
                .tx
                .disclosed_balance
                .total_cmp(&batch[a].tx.disclosed_balance)
        });
        let score = score_indices(batch, &order, carried, fees, tolerance);
        return BatchOrder {
            order,
            score,
            strategy: OrderStrategy::DescendingBalance,
        };
    }

    let mut best = order.clone();
    let mut best_score = score_indices(batch, &order, carried, fees, tolerance);
    while best_score < batch.len() && next_permutation(&mut order) {
        let score = score_indices(batch, &order, carried, fees, tolerance);
        if score > best_score {
            best_score = score;
            best.clone_from(&order);
        }
    }

    BatchOrder {
        order: best,
        score: best_score,
        strategy: OrderStrategy::Exhaustive,
    }
}

/// Resolve every same-timestamp batch of an already sorted row list.
pub fn resolve_order(rows: Vec<LedgerRow>, fees: FeeMode, cfg: &ReconConfig) -> Resolution {
    let mut resolved = Vec::with_capacity(rows.len());
    let mut batches = Vec::new();
    let mut carried: Option<f64> = None;
    let mut remaining = rows.into_iter().peekable();

    while let Some(first) = remaining.next() {
        let timestamp = first.tx.timestamp;
        let mut batch = vec![first];
        while let Some(next) = remaining.next_if(|r| r.tx.timestamp == timestamp) {
            batch.push(next);
        }

        let chosen = resolve_batch(&batch, carried, fees, cfg);
        match chosen.strategy {
            OrderStrategy::DescendingBalance => warn!(
                %timestamp,
                size = batch.len(),
                "same-timestamp batch too large to search; ordering by descending balance"
            ),
            OrderStrategy::Exhaustive => debug!(
                %timestamp,
                size = batch.len(),
                score = chosen.score,
                "resolved same-timestamp batch"
            ),
            OrderStrategy::Single => {}
        }
        batches.push(BatchResolution {
            timestamp,
            size: batch.len(),
            score: chosen.score,
            strategy: chosen.strategy,
        });

        let mut slots: Vec<Option<LedgerRow>> = batch.into_iter().map(Some).collect();
        for i in chosen.order {
            if let Some(row) = slots[i].take() {
                resolved.push(row);
            }
        }
        // Disclosed, not replayed: an earlier divergence must not blind the search.
        carried = resolved.last().map(|r| r.tx.disclosed_balance);
    }

    Resolution {
        rows: resolved,
        batches,
    }
}
