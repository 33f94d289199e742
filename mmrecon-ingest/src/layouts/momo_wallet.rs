//! Mobile money wallet export (MoMo-style)
//!
//! Expected table:
//!   Transaction Id | Date | Description | Status | Amount | Fee | Balance
//!   11802733412 | 2024-01-05 10:14 | Transfer to 2567... | Successful | -50,000 | 500 | 1,249,500

use mmrecon_core::{FeeMode, IdReliability, LedgerConventions};

use super::{AmountReading, CellView, ColumnSpec, Field, FieldFault, LayoutSpec};

pub static SPEC: LayoutSpec = LayoutSpec {
    name: "MomoWallet",
    titles: &["MOBILE MONEY STATEMENT", "MOMO STATEMENT", "MOMO ACCOUNT STATEMENT"],
    columns: &[
        ColumnSpec {
            field: Field::Id,
            aliases: &["transaction id", "financial transaction id", "id"],
            default_index: 0,
        },
        ColumnSpec {
            field: Field::Timestamp,
            aliases: &["date", "date time", "transaction date"],
            default_index: 1,
        },
        ColumnSpec {
            field: Field::Description,
            aliases: &["description", "narration", "details"],
            default_index: 2,
        },
        ColumnSpec {
            field: Field::Status,
            aliases: &["status"],
            default_index: 3,
        },
        ColumnSpec {
            field: Field::Amount,
            aliases: &["amount"],
            default_index: 4,
        },
        ColumnSpec {
            field: Field::Fee,
            aliases: &["fee", "fees"],
            default_index: 5,
        },
        ColumnSpec {
            field: Field::Balance,
            aliases: &["balance", "new balance"],
            default_index: 6,
        },
    ],
    min_columns: 7,
    conventions: LedgerConventions {
        fees: FeeMode::Separate,
        ids: IdReliability::Reliable,
    },
    read_amount,
};

/// Signed amount; unsigned values are credits.
fn read_amount(view: &CellView<'_>) -> Result<AmountReading, FieldFault> {
    view.required_numeric(Field::Amount).map(AmountReading::from_signed)
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
    fn test_header_match() {
        let header = cells(&["Transaction Id", "Date", "Description", "Status", "Amount", "Fee", "Balance"]);
        assert!(match_header(&header, &SPEC).is_some());

        // Airtel-style charges column is not a MoMo fee column.
        let header = cells(&["Transaction Id", "Date", "Description", "Status", "Amount", "Charges", "Balance"]);
        assert!(match_header(&header, &SPEC).is_none());
    }

    #[test]
    fn test_signed_amounts() {
        let map = SPEC.default_map();
        let row = cells(&["1", "t", "d", "Successful", "-50,000", "500", "1,249,500"]);
        let r = read_amount(&CellView::new(&row, &map)).unwrap();
        assert_eq!((r.amount, r.direction), (50_000.0, Direction::Debit));

        let row = cells(&["1", "t", "d", "Successful", "75,000", "0", "1,324,500"]);
        let r = read_amount(&CellView::new(&row, &map)).unwrap();
        assert_eq!(r.direction, Direction::Credit);
    }
}
