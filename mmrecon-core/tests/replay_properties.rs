// Property-based tests for the replay engine and order resolver.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;

use mmrecon_core::resolver::{resolve_batch, score_order};
use mmrecon_core::{
    FeeMode, LedgerConventions, LedgerRow, ReconConfig, SpecialKind, Statement, Transaction,
    Verdict, reconcile, replay,
};

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 9, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Non-zero signed amount in cents.
fn arb_amount_cents() -> impl Strategy<Value = i64> {
    prop_oneof![-500_000i64..=-1, 1i64..=500_000]
}

fn arb_special() -> impl Strategy<Value = Option<SpecialKind>> {
    prop_oneof![
        6 => Just(None),
        1 => Just(Some(SpecialKind::CommissionDisbursement)),
        1 => Just(Some(SpecialKind::Reversal)),
        1 => Just(Some(SpecialKind::Deallocation)),
        1 => Just(Some(SpecialKind::Failed)),
    ]
}

/// Arbitrary rows: amounts and disclosed balances unrelated to each other.
fn arb_rows() -> impl Strategy<Value = Vec<LedgerRow>> {
    prop::collection::vec(
        (arb_amount_cents(), 0i64..=2_000_000, arb_special(), any::<bool>()),
        1..40,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (amount, balance, kind, dup))| {
                let mut tx = Transaction::new(
                    format!("P{i}"),
                    t0() + Duration::minutes(i as i64),
                    "Transfer",
                    amount as f64 / 100.0,
                    balance as f64 / 100.0,
                );
                tx.special_kind = kind;
                LedgerRow {
                    tx,
                    is_duplicate: dup,
                }
            })
            .collect()
    })
}

fn permutations(n: usize) -> Vec<Vec<usize>> {
    fn go(prefix: &mut Vec<usize>, used: &mut [bool], out: &mut Vec<Vec<usize>>) {
        if prefix.len() == used.len() {
            out.push(prefix.clone());
            return;
        }
        for i in 0..used.len() {
            if !used[i] {
                used[i] = true;
                prefix.push(i);
                go(prefix, used, out);
                prefix.pop();
                used[i] = false;
            }
        }
    }
    let mut out = Vec::new();
    go(&mut Vec::new(), &mut vec![false; n], &mut out);
    out
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config())]

    /// A consistent, correctly ordered statement replays to its own closing balance.
    #[test]
    fn prop_consistent_statement_round_trips(
        opening in 0i64..=10_000_000,
        amounts in prop::collection::vec(arb_amount_cents(), 1..60),
    ) {
        let mut balance = opening;
        let txns: Vec<Transaction> = amounts
            .iter()
            .enumerate()
            .map(|(i, &a)| {
                balance += a;
                Transaction::new(
                    format!("T{i}"),
                    t0() + Duration::minutes(i as i64),
                    "Customer Transfer",
                    a as f64 / 100.0,
                    balance as f64 / 100.0,
                )
            })
            .collect();

        let report = reconcile(
            Statement::new(txns, LedgerConventions::default()),
            &ReconConfig::default(),
        )
        .unwrap();
        let s = &report.summary;
        prop_assert_eq!(s.opening_balance, opening as f64 / 100.0);
        prop_assert_eq!(s.final_replayed_balance, s.closing_balance);
        prop_assert_eq!(s.divergence, 0.0);
        prop_assert_eq!(s.divergence_change_count, 0);
        prop_assert_eq!(s.verdict, Verdict::Verified);
    }

    /// Duplicate rows leave the running balance exactly where it was.
    #[test]
    fn prop_duplicates_do_not_move_balance(rows in arb_rows()) {
        // Restart markers would legitimately move the balance on the next row.
        let rows: Vec<LedgerRow> = rows
            .into_iter()
            .map(|mut r| {
                if r.tx.special_kind.is_some_and(SpecialKind::is_restart_marker) {
                    r.tx.special_kind = None;
                }
                r
            })
            .collect();
        let out = replay(&rows, FeeMode::Embedded);
        let mut before = out.opening_balance;
        for (row, result) in rows.iter().zip(&out.results) {
            if row.is_duplicate {
                prop_assert_eq!(result.replayed_balance, before);
            }
            before = result.replayed_balance;
        }
    }

    /// The divergence-change counter never decreases along a statement.
    #[test]
    fn prop_change_count_is_monotonic(rows in arb_rows()) {
        let out = replay(&rows, FeeMode::Separate);
        for pair in out.results.windows(2) {
            prop_assert!(pair[0].divergence_change_count <= pair[1].divergence_change_count);
        }
        if let Some(last) = out.results.last() {
            prop_assert_eq!(last.divergence_change_count, out.state.divergence_change_count);
        }
    }

    /// Within the search limit the chosen order scores at least as well as any other.
    #[test]
    fn prop_resolver_is_optimal(
        carried in prop::option::of(0i64..=100_000),
        specs in prop::collection::vec((arb_amount_cents(), -3i64..=3), 2..=6),
    ) {
        // Balances roughly follow the amounts so some orders score well.
        let mut balance = carried.unwrap_or(50_000);
        let batch: Vec<LedgerRow> = specs
            .iter()
            .enumerate()
            .map(|(i, &(amount, noise))| {
                balance += amount;
                LedgerRow {
                    tx: Transaction::new(
                        format!("B{i}"),
                        t0(),
                        "Transfer",
                        amount as f64 / 100.0,
                        (balance + noise) as f64 / 100.0,
                    ),
                    is_duplicate: false,
                }
            })
            .collect();
        let carried = carried.map(|c| c as f64 / 100.0);
        let cfg = ReconConfig::default();

        let chosen = resolve_batch(&batch, carried, FeeMode::Embedded, &cfg);
        let chosen_rows: Vec<&LedgerRow> = chosen.order.iter().map(|&i| &batch[i]).collect();
        prop_assert_eq!(
            score_order(&chosen_rows, carried, FeeMode::Embedded, cfg.match_tolerance),
            chosen.score
        );

        for perm in permutations(batch.len()) {
            let rows: Vec<&LedgerRow> = perm.iter().map(|&i| &batch[i]).collect();
            let score = score_order(&rows, carried, FeeMode::Embedded, cfg.match_tolerance);
            prop_assert!(score <= chosen.score, "{:?} scored {} > {}", perm, score, chosen.score);
        }
    }
}
