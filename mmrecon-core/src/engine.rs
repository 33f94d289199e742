//! Statement reconciliation pipeline.
//!
//! filter -> duplicate detection -> order resolution -> replay -> verdict.
//! Everything here is statement-local; the only shared input is the
//! read-only configuration and pattern tables.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::thread;
use tracing::{info, warn};

use crate::config::ReconConfig;
use crate::duplicates::detect_duplicates;
use crate::error::{ReconError, Result};
use crate::model::{LedgerRow, Statement, round_cents};
use crate::replay::{ReconciliationResult, replay};
use crate::resolver::{BatchResolution, resolve_order};
use crate::rules::{ExcludedRow, apply_business_rules};
use crate::verdict::{Verdict, VerdictThresholds, classify, divergence_change_ratio};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatementSummary {
    pub opening_balance: f64,
    pub total_credits: f64,
    pub total_debits: f64,
    pub total_fees: f64,
    pub final_replayed_balance: f64,
    pub closing_balance: f64,
    /// Divergence recorded on the last row
    pub divergence: f64,
    pub divergence_change_count: usize,
    pub divergence_change_ratio: f64,
    pub verdict: Verdict,
    pub row_count: usize,
    pub duplicate_count: usize,
    pub excluded_count: usize,
    /// Rows carrying a sign or column-bleed repair
    pub numeric_repairs: usize,
    pub embedded_header_rows: usize,
    pub skipped_rows: usize,
    pub continuation_rows: usize,
    /// Same-timestamp batches ordered heuristically instead of searched
    pub heuristic_batches: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatementReport {
    pub layout: Option<String>,
    /// One entry per replayed transaction, in resolved order
    pub rows: Vec<ReconciliationResult>,
    pub excluded: Vec<ExcludedRow>,
    pub batches: Vec<BatchResolution>,
    pub summary: StatementSummary,
}

/// Reconcile one statement.
pub fn reconcile(statement: Statement, cfg: &ReconConfig) -> Result<StatementReport> {
    let Statement {
        layout,
        transactions,
        conventions,
        extraction,
    } = statement;

    if transactions.is_empty() {
        return Err(ReconError::NoDataExtracted {
            layout: layout.unwrap_or_else(|| "unspecified".to_string()),
        });
    }

    let numeric_repairs = transactions
        .iter()
        .filter(|t| t.quality_flags.iter().any(|f| f.is_numeric_repair()))
        .count();
    if numeric_repairs > 0 {
        warn!(numeric_repairs, "statement required numeric field repairs");
    }
    if extraction.embedded_header_rows > 0 {
        warn!(
            embedded_header_rows = extraction.embedded_header_rows,
            "header rows found inside the data body"
        );
    }

    let patterns = cfg.rule_patterns()?;
    let filtered = apply_business_rules(transactions, &patterns);
    if filtered.kept.is_empty() {
        return Err(ReconError::NothingToReplay {
            excluded: filtered.excluded.len(),
        });
    }
    if !filtered.excluded.is_empty() {
        warn!(excluded = filtered.excluded.len(), "rows excluded by business rules");
    }

    let duplicates = detect_duplicates(&filtered.kept, conventions.ids);
    let rows: Vec<LedgerRow> = filtered
        .kept
        .into_iter()
        .zip(duplicates)
        .map(|(tx, is_duplicate)| LedgerRow { tx, is_duplicate })
        .collect();

    let resolution = resolve_order(rows, conventions.fees, cfg);
    let heuristic_batches = resolution.heuristic_batches();
    let rows = resolution.rows;
    let replayed = replay(&rows, conventions.fees);

    let mut total_credits = 0.0;
    let mut total_debits = 0.0;
    let mut total_fees = 0.0;
    for row in rows.iter().filter(|r| !r.is_duplicate) {
        if row.tx.is_credit() {
            total_credits += row.tx.amount;
        } else {
            total_debits += row.tx.amount;
        }
        total_fees += row.tx.fee;
    }

    let row_count = rows.len();
    let divergence = replayed.state.last_divergence;
    let change_count = replayed.state.divergence_change_count;
    let ratio = divergence_change_ratio(change_count, row_count);
    let verdict = classify(divergence, ratio, VerdictThresholds::from(cfg));
    let closing_balance = rows
        .last()
        .map_or(replayed.opening_balance, |r| r.tx.disclosed_balance);

    info!(
        layout = layout.as_deref().unwrap_or("unspecified"),
        rows = row_count,
        divergence,
        change_count,
        ratio,
        verdict = verdict.label(),
        "statement reconciled"
    );

    let summary = StatementSummary {
        opening_balance: replayed.opening_balance,
        total_credits: round_cents(total_credits),
        total_debits: round_cents(total_debits),
        total_fees: round_cents(total_fees),
        final_replayed_balance: replayed.state.running_balance,
        closing_balance,
        divergence,
        divergence_change_count: change_count,
        divergence_change_ratio: ratio,
        verdict,
        row_count,
        duplicate_count: rows.iter().filter(|r| r.is_duplicate).count(),
        excluded_count: filtered.excluded.len(),
        numeric_repairs,
        embedded_header_rows: extraction.embedded_header_rows,
        skipped_rows: extraction.skipped_rows,
        continuation_rows: extraction.continuation_rows,
        heuristic_batches,
    };

    Ok(StatementReport {
        layout,
        rows: replayed.results,
        excluded: filtered.excluded,
        batches: resolution.batches,
        summary,
    })
}

/// Reconcile independent statements concurrently, at most one scoped thread
/// per available core at a time. Results come back in input order.
pub fn reconcile_all(statements: Vec<Statement>, cfg: &ReconConfig) -> Vec<Result<StatementReport>> {
    let workers = thread::available_parallelism().map_or(1, NonZeroUsize::get);
    reconcile_in_chunks(statements, cfg, workers)
}

fn reconcile_in_chunks(
    statements: Vec<Statement>,
    cfg: &ReconConfig,
    workers: usize,
) -> Vec<Result<StatementReport>> {
    let workers = workers.max(1);
    let mut results = Vec::with_capacity(statements.len());
    let mut pending = statements.into_iter().peekable();

    while pending.peek().is_some() {
        let chunk: Vec<Statement> = pending.by_ref().take(workers).collect();
        thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .into_iter()
                .map(|statement| scope.spawn(move || reconcile(statement, cfg)))
                .collect();
            for handle in handles {
                match handle.join() {
                    Ok(result) => results.push(result),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
        });
    }
    results
}
