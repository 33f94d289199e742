//! Row mapper: detected layout + raw rows -> canonical transactions.
//!
//! Walks every table row in document order. Header rows (re)build the column
//! map; a header that shows up after data rows in the same table is counted as
//! embedded. Wrapped descriptions are folded into the row above. Rows failing
//! the column-count or timestamp check are skipped and counted; a row that
//! passes them but carries an unreadable numeric cell fails the whole document.

use chrono::NaiveDateTime;
use mmrecon_core::{ExtractionStats, QualityFlag, ReconConfig, ReconError, Result, Transaction};
use tracing::{debug, warn};

use crate::detect::{Detection, match_header};
use crate::document::{Document, RawRow};
use crate::layouts::{CellView, Field, FieldFault, Layout, LayoutSpec};
use crate::normalize::{clean_text, parse_status, parse_timestamp, repair_column_bleed};

/// Mapped rows plus extraction counters.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub layout: Layout,
    pub transactions: Vec<Transaction>,
    pub stats: ExtractionStats,
}

const AMOUNT_FIELDS: [Field; 5] = [Field::Amount, Field::PaidIn, Field::Withdrawn, Field::Fee, Field::Balance];

fn is_continuation(view: &CellView<'_>) -> bool {
    view.is_blank(Field::Timestamp)
        && !view.is_blank(Field::Description)
        && AMOUNT_FIELDS.iter().all(|f| view.is_blank(*f))
}

pub fn map_rows(doc: &Document, detection: &Detection, cfg: &ReconConfig) -> Result<Extraction> {
    let spec = detection.layout.spec();
    let mut map = spec.default_map();
    let mut stats = ExtractionStats::default();
    let mut transactions: Vec<Transaction> = Vec::new();

    let mut current_table = None;
    let mut data_in_table = false;

    for raw in doc.raw_rows() {
        if current_table != Some((raw.page, raw.table)) {
            current_table = Some((raw.page, raw.table));
            data_in_table = false;
        }
        if raw.is_blank() {
            continue;
        }

        if let Some(header) = match_header(raw.cells, spec) {
            if data_in_table {
                stats.embedded_header_rows += 1;
                warn!(page = raw.page, row = raw.position + 1, "header row embedded in data body");
            }
            map = header;
            continue;
        }

        let view = CellView::new(raw.cells, &map);
        if is_continuation(&view) {
            if let Some(prev) = transactions.last_mut() {
                let tail = clean_text(view.get(Field::Description));
                prev.description = format!("{} {}", prev.description, tail);
                stats.continuation_rows += 1;
                continue;
            }
        }

        if raw.cells.len() < spec.min_columns {
            stats.skipped_rows += 1;
            continue;
        }
        let Some(timestamp) = parse_timestamp(view.get(Field::Timestamp), &cfg.date_formats) else {
            debug!(page = raw.page, row = raw.position + 1, "row without a valid timestamp skipped");
            stats.skipped_rows += 1;
            continue;
        };

        let tx = build_transaction(&view, timestamp, spec, cfg)
            .map_err(|fault| corruption(&raw, fault))?
            .with_source(raw.page, raw.position + 1);
        data_in_table = true;
        transactions.push(tx);
    }

    if transactions.is_empty() {
        return Err(ReconError::NoDataExtracted {
            layout: spec.name.to_string(),
        });
    }

    debug!(
        layout = spec.name,
        rows = transactions.len(),
        skipped = stats.skipped_rows,
        continuation = stats.continuation_rows,
        embedded_headers = stats.embedded_header_rows,
        "rows mapped"
    );
    Ok(Extraction {
        layout: detection.layout,
        transactions,
        stats,
    })
}

fn corruption(raw: &RawRow<'_>, fault: FieldFault) -> ReconError {
    ReconError::FieldCorruptionUnrepairable {
        page: raw.page,
        row: raw.position + 1,
        field: fault.field.label(),
        value: fault.value,
    }
}

fn build_transaction(
    view: &CellView<'_>,
    timestamp: NaiveDateTime,
    spec: &LayoutSpec,
    cfg: &ReconConfig,
) -> std::result::Result<Transaction, FieldFault> {
    let reading = (spec.read_amount)(view)?;
    let mut flags = Vec::new();
    if reading.sign_repaired {
        flags.push(QualityFlag::SignRepaired);
    }

    let bled = if spec.has(Field::Fee) {
        repair_column_bleed(view.get(Field::Fee), view.get(Field::Balance), cfg.fee_bleed_threshold)
    } else {
        None
    };
    let (fee, balance) = match bled {
        Some(balance) => {
            flags.push(QualityFlag::BalanceRepaired);
            (0.0, balance)
        }
        None => {
            let fee = if spec.has(Field::Fee) {
                view.numeric(Field::Fee)?
            } else {
                None
            };
            // A bare fractional balance is the tail of a split number.
            let balance_raw = view.get(Field::Balance);
            if balance_raw.trim_start().starts_with('.') {
                return Err(FieldFault {
                    field: Field::Balance,
                    value: balance_raw.to_string(),
                });
            }
            let balance = view.required_numeric(Field::Balance)?;
            if balance.sign_repaired || fee.is_some_and(|f| f.sign_repaired) {
                flags.push(QualityFlag::SignRepaired);
            }
            (fee.map_or(0.0, |f| f.value), balance.value)
        }
    };

    let (status, unknown_status) = parse_status(view.get(Field::Status));
    if unknown_status {
        flags.push(QualityFlag::UnknownStatus);
    }

    let mut tx = Transaction::new(
        clean_text(view.get(Field::Id)),
        timestamp,
        clean_text(view.get(Field::Description)),
        reading.amount,
        balance,
    )
    .with_fee(fee)
    .with_status(status);
    tx.direction = reading.direction;

    for flag in flags {
        if flag.is_numeric_repair() {
            warn!(id = %tx.id, ?flag, "numeric field repaired");
        }
        tx = tx.with_flag(flag);
    }
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectedBy;
    use crate::document::{ExtractedTable, Page};
    use mmrecon_core::{Direction, TxStatus};

    const MOMO_HEADER: [&str; 7] = ["Transaction Id", "Date", "Description", "Status", "Amount", "Fee", "Balance"];

    fn momo() -> Detection {
        Detection {
            layout: Layout::MomoWallet,
            via: DetectedBy::Header,
        }
    }

    fn doc(rows: Vec<Vec<&str>>) -> Document {
        Document::single_table("", ExtractedTable::from_rows(rows))
    }

    #[test]
    fn test_maps_signed_amounts_and_fees() {
        let d = doc(vec![
            MOMO_HEADER.to_vec(),
            vec!["1", "2024-01-05 10:00:00", "Deposit", "Successful", "10,000", "", "10,000"],
            vec!["2", "2024-01-05 11:00:00", "Transfer to 2567", "Successful", "-5,000", "100", "4,900"],
        ]);
        let ex = map_rows(&d, &momo(), &ReconConfig::default()).unwrap();
        assert_eq!(ex.transactions.len(), 2);

        let t = &ex.transactions[1];
        assert_eq!(t.direction, Direction::Debit);
        assert_eq!((t.amount, t.fee, t.disclosed_balance), (5000.0, 100.0, 4900.0));
        assert_eq!(t.source.map(|s| (s.page, s.row)), Some((1, 3)));
        assert_eq!(ex.stats, ExtractionStats::default());
    }

    #[test]
    fn test_continuation_and_skipped_rows() {
        let d = doc(vec![
            MOMO_HEADER.to_vec(),
            vec!["1", "2024-01-05 10:00:00", "Payment to", "Successful", "-500", "0", "9,500"],
            vec!["", "", "SUPERMARKET LTD", "", "", "", ""],
            vec!["Total", "", "", "", "", "", ""],
            vec!["2", "not a date", "x", "Successful", "-1", "0", "9,499"],
            vec!["Page 1 of 3"],
        ]);
        let ex = map_rows(&d, &momo(), &ReconConfig::default()).unwrap();
        assert_eq!(ex.transactions.len(), 1);
        assert_eq!(ex.transactions[0].description, "Payment to SUPERMARKET LTD");
        assert_eq!(ex.stats.continuation_rows, 1);
        // "Total" has no timestamp but also no description: skipped, not merged.
        assert_eq!(ex.stats.skipped_rows, 3);
    }

    #[test]
    fn test_header_on_each_page_is_not_embedded() {
        let page = |n: usize, rows: Vec<Vec<&str>>| Page {
            number: n,
            text: String::new(),
            tables: vec![ExtractedTable::from_rows(rows)],
        };
        let d = Document::new(vec![
            page(1, vec![MOMO_HEADER.to_vec(), vec!["1", "2024-01-05", "a", "", "5", "", "5"]]),
            page(2, vec![
                MOMO_HEADER.to_vec(),
                vec!["2", "2024-01-06", "b", "", "5", "", "10"],
                MOMO_HEADER.to_vec(),
                vec!["3", "2024-01-07", "c", "", "5", "", "15"],
            ]),
        ]);
        let ex = map_rows(&d, &momo(), &ReconConfig::default()).unwrap();
        assert_eq!(ex.transactions.len(), 3);
        assert_eq!(ex.stats.embedded_header_rows, 1);
    }

    #[test]
    fn test_flags_repairs_and_unknown_status() {
        let d = doc(vec![
            vec!["1", "2024-01-05 10:00:00", "Bulk payout", "Successful", "-50", "1,234,567", ".89"],
            vec!["2", "2024-01-05 11:00:00", "Refund", "On hold", "--10", "0", "1,234,507.89"],
        ]);
        let ex = map_rows(&d, &momo(), &ReconConfig::default()).unwrap();

        let bled = &ex.transactions[0];
        assert_eq!((bled.fee, bled.disclosed_balance), (0.0, 1_234_567.89));
        assert!(bled.quality_flags.contains(&QualityFlag::BalanceRepaired));

        let odd = &ex.transactions[1];
        assert_eq!(odd.status, TxStatus::Success);
        assert!(odd.quality_flags.contains(&QualityFlag::SignRepaired));
        assert!(odd.quality_flags.contains(&QualityFlag::UnknownStatus));
    }

    #[test]
    fn test_unreadable_balance_fails_the_document() {
        let d = doc(vec![
            MOMO_HEADER.to_vec(),
            vec!["1", "2024-01-05 10:00:00", "Deposit", "Successful", "100", "0", "1O0.00"],
        ]);
        let err = map_rows(&d, &momo(), &ReconConfig::default()).unwrap_err();
        match err {
            ReconError::FieldCorruptionUnrepairable { page, row, field, value } => {
                assert_eq!((page, row, field), (1, 2, "balance"));
                assert_eq!(value, "1O0.00");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fee_with_trailing_digits_fails_the_document() {
        let d = doc(vec![
            MOMO_HEADER.to_vec(),
            vec!["1", "2024-01-05 10:00:00", "Bulk payout", "Successful", "-50", "30.00 1234567", ".89"],
        ]);
        let err = map_rows(&d, &momo(), &ReconConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ReconError::FieldCorruptionUnrepairable { field: "fee", ref value, .. } if value == "30.00 1234567"
        ));
    }

    #[test]
    fn test_fractional_balance_without_bleed_fails_the_document() {
        let d = doc(vec![
            MOMO_HEADER.to_vec(),
            vec!["1", "2024-01-05 10:00:00", "Deposit", "Successful", "100", "30.00", ".89"],
        ]);
        let err = map_rows(&d, &momo(), &ReconConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ReconError::FieldCorruptionUnrepairable { field: "balance", ref value, .. } if value == ".89"
        ));
    }

    #[test]
    fn test_no_rows_is_no_data() {
        let d = doc(vec![MOMO_HEADER.to_vec(), vec!["No transactions in period"]]);
        let err = map_rows(&d, &momo(), &ReconConfig::default()).unwrap_err();
        assert!(matches!(err, ReconError::NoDataExtracted { ref layout } if layout == "MomoWallet"));
    }
}
