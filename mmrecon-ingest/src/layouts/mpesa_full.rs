//! M-PESA full statement (customer and business wallets)
//!
//! Expected table:
//!   Receipt No. | Completion Time | Details | Transaction Status | Paid In | Withdrawn | Balance
//!   SAB12CD34E  | 2024-01-05 10:14:02 | Pay Bill to 888880 ... | Completed | | -1,500.00 | 3,210.50
//!
//! Charges are posted as their own rows, so fees are embedded.

use mmrecon_core::{Direction, FeeMode, IdReliability, LedgerConventions};

use super::{AmountReading, CellView, ColumnSpec, Field, FieldFault, LayoutSpec};

pub static SPEC: LayoutSpec = LayoutSpec {
    name: "MpesaFull",
    titles: &["M-PESA STATEMENT", "MPESA STATEMENT", "MPESA FULL STATEMENT", "M-PESA FULL STATEMENT"],
    columns: &[
        ColumnSpec {
            field: Field::Id,
            aliases: &["receipt no", "reciept no", "receipt number", "receipt"],
            default_index: 0,
        },
        ColumnSpec {
            field: Field::Timestamp,
            aliases: &["completion time", "completion tme", "completion date"],
            default_index: 1,
        },
        ColumnSpec {
            field: Field::Description,
            aliases: &["details", "detail", "transaction details"],
            default_index: 2,
        },
        ColumnSpec {
            field: Field::Status,
            aliases: &["transaction status", "status"],
            default_index: 3,
        },
        ColumnSpec {
            field: Field::PaidIn,
            aliases: &["paid in", "paidin", "paid ln"],
            default_index: 4,
        },
        ColumnSpec {
            field: Field::Withdrawn,
            aliases: &["withdrawn", "withdrawen", "withdraw"],
            default_index: 5,
        },
        ColumnSpec {
            field: Field::Balance,
            aliases: &["balance", "balanace", "bal"],
            default_index: 6,
        },
    ],
    min_columns: 7,
    conventions: LedgerConventions {
        fees: FeeMode::Embedded,
        ids: IdReliability::Reliable,
    },
    read_amount,
};

/// Paid In is a credit, Withdrawn a debit (printed with or without a minus).
fn read_amount(view: &CellView<'_>) -> Result<AmountReading, FieldFault> {
    let paid_in = view.numeric(Field::PaidIn)?;
    let withdrawn = view.numeric(Field::Withdrawn)?;

    match (paid_in, withdrawn) {
        (_, Some(w)) if w.value != 0.0 => Ok(AmountReading {
            amount: w.value.abs(),
            direction: Direction::Debit,
            sign_repaired: w.sign_repaired,
        }),
        (Some(p), _) => Ok(AmountReading::from_signed(p)),
        // Informational rows carry no amount.
        (None, _) => Ok(AmountReading {
            amount: 0.0,
            direction: Direction::Credit,
            sign_repaired: false,
        }),
    }
}
