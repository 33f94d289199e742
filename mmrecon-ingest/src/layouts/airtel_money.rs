//! Airtel Money statement
//!
//! Expected table:
//!   Transaction ID | Transaction Date | Description | Status | Amount | Credit/Debit | Charges | Balance
//!   MP240105.1014.A12345 | 05-01-2024 10:14:02 | Send Money to 0733... | Success | 1,500.00 | DR | 15.00 | 3,195.50
//!
//! Amounts are unsigned with a direction column; charges are deducted on top.
//! Transaction ids are reused across reversal pairs, so identity falls back to
//! (timestamp, amount, balance).

use mmrecon_core::{FeeMode, IdReliability, LedgerConventions};

use super::{AmountReading, CellView, ColumnSpec, Field, FieldFault, LayoutSpec};
use crate::normalize::parse_direction;

pub static SPEC: LayoutSpec = LayoutSpec {
    name: "AirtelMoney",
    titles: &["AIRTEL MONEY STATEMENT", "AIRTEL MONEY ACCOUNT STATEMENT"],
    columns: &[
        ColumnSpec {
            field: Field::Id,
            aliases: &["transaction id", "txn id", "trans id", "transaction ld"],
            default_index: 0,
        },
        ColumnSpec {
            field: Field::Timestamp,
            aliases: &["transaction date", "txn date", "date"],
            default_index: 1,
        },
        ColumnSpec {
            field: Field::Description,
            aliases: &["description", "descripton", "details"],
            default_index: 2,
        },
        ColumnSpec {
            field: Field::Status,
            aliases: &["status", "transaction status"],
            default_index: 3,
        },
        ColumnSpec {
            field: Field::Amount,
            aliases: &["amount", "amt"],
            default_index: 4,
        },
        ColumnSpec {
            field: Field::Direction,
            aliases: &["credit debit", "cr dr", "dr cr", "type"],
            default_index: 5,
        },
        ColumnSpec {
            field: Field::Fee,
            aliases: &["charges", "charge", "service charge", "fee"],
            default_index: 6,
        },
        ColumnSpec {
            field: Field::Balance,
            aliases: &["balance", "post balance", "closing balance"],
            default_index: 7,
        },
    ],
    min_columns: 8,
    conventions: LedgerConventions {
        fees: FeeMode::Separate,
        ids: IdReliability::Unreliable,
    },
    read_amount,
};

/// The direction column wins over any sign printed in the amount.
fn read_amount(view: &CellView<'_>) -> Result<AmountReading, FieldFault> {
    let amount = view.required_numeric(Field::Amount)?;
    let raw = view.get(Field::Direction);
    let direction = parse_direction(raw).ok_or_else(|| FieldFault {
        field: Field::Direction,
        value: raw.to_string(),
    })?;
    Ok(AmountReading {
        amount: amount.value.abs(),
        direction,
        sign_repaired: amount.sign_repaired,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::match_header;
    use mmrecon_core::Direction;

    fn cells(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_header_maps_reordered_columns() {
        let header = cells(&[
            "Transaction ID",
            "Transaction Date",
            "Description",
            "Status",
            "Credit/Debit",
            "Amount",
            "Charges",
            "Balance",
        ]);
        let map = match_header(&header, &SPEC).unwrap();
        assert_eq!(map.index(Field::Direction), Some(4));
        assert_eq!(map.index(Field::Amount), Some(5));
    }

    #[test]
    fn test_direction_column_governs() {
        let map = SPEC.default_map();
        let row = cells(&["X", "t", "d", "Success", "-1,500.00", "CR", "0", "10"]);
        let r = read_amount(&CellView::new(&row, &map)).unwrap();
        assert_eq!((r.amount, r.direction), (1500.0, Direction::Credit));
    }

    #[test]
    fn test_missing_direction_is_a_fault() {
        let map = SPEC.default_map();
        let row = cells(&["X", "t", "d", "Success", "1,500.00", "", "0", "10"]);
        assert_eq!(read_amount(&CellView::new(&row, &map)).unwrap_err().field, Field::Direction);

        let row = cells(&["X", "t", "d", "Success", "", "DR", "0", "10"]);
        assert_eq!(read_amount(&CellView::new(&row, &map)).unwrap_err().field, Field::Amount);
    }
}
