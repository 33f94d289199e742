//! Supported statement layouts.
//!
//! Each vendor module declares a static [`LayoutSpec`]: title strings, column
//! aliases (including known vendor typos), conventions, and how its amount
//! columns combine into an unsigned amount plus direction.

pub mod airtel_money;
pub mod momo_wallet;
pub mod mpesa_full;

use mmrecon_core::{Direction, LedgerConventions};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::normalize::{NumericField, parse_numeric};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layout {
    MpesaFull,
    AirtelMoney,
    MomoWallet,
}

impl Layout {
    /// Detection order: layouts with more required columns first.
    pub const ALL: [Layout; 3] = [Layout::MpesaFull, Layout::AirtelMoney, Layout::MomoWallet];

    pub fn spec(self) -> &'static LayoutSpec {
        match self {
            Layout::MpesaFull => &mpesa_full::SPEC,
            Layout::AirtelMoney => &airtel_money::SPEC,
            Layout::MomoWallet => &momo_wallet::SPEC,
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }
}

/// Canonical target fields a column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Timestamp,
    Description,
    Status,
    /// Single amount column (signed or unsigned)
    Amount,
    PaidIn,
    Withdrawn,
    Direction,
    Fee,
    Balance,
}

impl Field {
    pub fn label(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Timestamp => "timestamp",
            Field::Description => "description",
            Field::Status => "status",
            Field::Amount => "amount",
            Field::PaidIn => "paid in",
            Field::Withdrawn => "withdrawn",
            Field::Direction => "direction",
            Field::Fee => "fee",
            Field::Balance => "balance",
        }
    }
}

#[derive(Debug)]
pub struct ColumnSpec {
    pub field: Field,
    /// Normalised header spellings, typos included
    pub aliases: &'static [&'static str],
    /// Position used when the table carries no header row
    pub default_index: usize,
}

/// Unsigned amount with its direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountReading {
    pub amount: f64,
    pub direction: Direction,
    pub sign_repaired: bool,
}

impl AmountReading {
    pub fn from_signed(n: NumericField) -> Self {
        Self {
            amount: n.value.abs(),
            direction: if n.value < 0.0 {
                Direction::Debit
            } else {
                Direction::Credit
            },
            sign_repaired: n.sign_repaired,
        }
    }
}

/// A cell that could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFault {
    pub field: Field,
    pub value: String,
}

#[derive(Debug)]
pub struct LayoutSpec {
    pub name: &'static str,
    /// Upper-case title strings looked for in the first page text
    pub titles: &'static [&'static str],
    pub columns: &'static [ColumnSpec],
    pub min_columns: usize,
    pub conventions: LedgerConventions,
    pub read_amount: fn(&CellView<'_>) -> Result<AmountReading, FieldFault>,
}

impl LayoutSpec {
    pub fn has(&self, field: Field) -> bool {
        self.columns.iter().any(|c| c.field == field)
    }

    pub fn default_map(&self) -> ColumnMap {
        ColumnMap(
            self.columns
                .iter()
                .map(|c| (c.field, c.default_index))
                .collect(),
        )
    }
}

/// Field -> cell index for one table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnMap(pub HashMap<Field, usize>);

impl ColumnMap {
    pub fn index(&self, field: Field) -> Option<usize> {
        self.0.get(&field).copied()
    }
}

/// Read access to one row's cells through a column map.
#[derive(Debug, Clone, Copy)]
pub struct CellView<'a> {
    pub cells: &'a [String],
    pub map: &'a ColumnMap,
}

impl<'a> CellView<'a> {
    pub fn new(cells: &'a [String], map: &'a ColumnMap) -> Self {
        Self { cells, map }
    }

    /// Cell text for a field; empty when unmapped or out of range.
    pub fn get(&self, field: Field) -> &'a str {
        self.map
            .index(field)
            .and_then(|i| self.cells.get(i))
            .map_or("", String::as_str)
    }

    pub fn is_blank(&self, field: Field) -> bool {
        self.get(field).trim().is_empty()
    }

    pub fn numeric(&self, field: Field) -> Result<Option<NumericField>, FieldFault> {
        let raw = self.get(field);
        parse_numeric(raw).map_err(|_| FieldFault {
            field,
            value: raw.to_string(),
        })
    }

    /// Numeric field that must be present.
    pub fn required_numeric(&self, field: Field) -> Result<NumericField, FieldFault> {
        self.numeric(field)?.ok_or_else(|| FieldFault {
            field,
            value: String::new(),
        })
    }
}
