//! Canonical transaction model shared by every stage of the pipeline.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Round a monetary value to whole cents.
pub fn to_cents(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Round a monetary value to two decimal places.
pub fn round_cents(value: f64) -> f64 {
    to_cents(value) as f64 / 100.0
}

/// Direction of money movement relative to the statement holder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    #[serde(rename = "debit")]
    Debit,
    #[serde(rename = "credit")]
    Credit,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Credit => 1.0,
            Direction::Debit => -1.0,
        }
    }
}

/// Posting status printed by the vendor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TxStatus {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "rolled-back")]
    RolledBack,
}

impl TxStatus {
    /// Whether the transaction actually posted to the account.
    pub fn posts(self) -> bool {
        matches!(self, TxStatus::Success)
    }
}

/// Transaction types that must not be summed naively.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SpecialKind {
    #[serde(rename = "duplicate-commission")]
    DuplicateCommission,
    #[serde(rename = "commission-disbursement")]
    CommissionDisbursement,
    #[serde(rename = "deallocation")]
    Deallocation,
    #[serde(rename = "rollback")]
    Rollback,
    #[serde(rename = "reversal")]
    Reversal,
    #[serde(rename = "failed")]
    Failed,
}

impl SpecialKind {
    /// After a restart marker the replay resynchronises to the disclosed balance.
    pub fn is_restart_marker(self) -> bool {
        match self {
            SpecialKind::CommissionDisbursement
            | SpecialKind::Deallocation
            | SpecialKind::Rollback
            | SpecialKind::Reversal => true,
            SpecialKind::DuplicateCommission | SpecialKind::Failed => false,
        }
    }
}

/// Markers raised while normalising raw cells.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QualityFlag {
    /// A run of leading sign characters was collapsed to one.
    #[serde(rename = "sign-repaired")]
    SignRepaired,
    /// Fee/balance column bleed was reconstructed.
    #[serde(rename = "balance-repaired")]
    BalanceRepaired,
    /// Status text was not recognised and treated as success.
    #[serde(rename = "unknown-status")]
    UnknownStatus,
}

impl QualityFlag {
    pub fn is_numeric_repair(self) -> bool {
        matches!(self, QualityFlag::SignRepaired | QualityFlag::BalanceRepaired)
    }
}

/// How a layout reports transaction fees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum FeeMode {
    /// Fees are already inside the amount or posted as their own rows.
    #[default]
    #[serde(rename = "embedded")]
    Embedded,
    /// Fees sit in their own column and are deducted on top of the amount.
    #[serde(rename = "separate")]
    Separate,
}

/// Whether vendor transaction ids can be trusted as identity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum IdReliability {
    #[default]
    #[serde(rename = "reliable")]
    Reliable,
    #[serde(rename = "unreliable")]
    Unreliable,
}

/// Layout-level accounting conventions the engine needs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LedgerConventions {
    pub fees: FeeMode,
    pub ids: IdReliability,
}

/// Where a transaction came from in the source document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRef {
    pub page: usize,
    pub row: usize,
}

/// One canonical statement transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Vendor receipt/transaction id (not guaranteed unique)
    pub id: String,
    pub timestamp: NaiveDateTime,
    /// Whitespace-collapsed description text
    pub description: String,
    pub status: TxStatus,
    /// Unsigned magnitude; `direction` carries the sign
    pub amount: f64,
    pub direction: Direction,
    /// Unsigned fee; only deducted when the layout reports fees separately
    pub fee: f64,
    /// Balance the statement claims after this transaction
    pub disclosed_balance: f64,
    pub quality_flags: BTreeSet<QualityFlag>,
    pub special_kind: Option<SpecialKind>,
    pub source: Option<SourceRef>,
}

impl Transaction {
    /// Create a successful transaction from a signed amount.
    pub fn new(
        id: impl Into<String>,
        timestamp: NaiveDateTime,
        description: impl Into<String>,
        signed_amount: f64,
        disclosed_balance: f64,
    ) -> Self {
        let direction = if signed_amount < 0.0 {
            Direction::Debit
        } else {
            Direction::Credit
        };
        Self {
            id: id.into(),
            timestamp,
            description: description.into(),
            status: TxStatus::Success,
            amount: signed_amount.abs(),
            direction,
            fee: 0.0,
            disclosed_balance,
            quality_flags: BTreeSet::new(),
            special_kind: None,
            source: None,
        }
    }

    pub fn with_fee(mut self, fee: f64) -> Self {
        self.fee = fee.abs();
        self
    }

    pub fn with_status(mut self, status: TxStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_flag(mut self, flag: QualityFlag) -> Self {
        self.quality_flags.insert(flag);
        self
    }

    pub fn with_special_kind(mut self, kind: SpecialKind) -> Self {
        self.special_kind = Some(kind);
        self
    }

    pub fn with_source(mut self, page: usize, row: usize) -> Self {
        self.source = Some(SourceRef { page, row });
        self
    }

    pub fn signed_amount(&self) -> f64 {
        self.direction.sign() * self.amount
    }

    /// Literal effect of this row on the balance under the given fee convention.
    pub fn effect(&self, fees: FeeMode) -> f64 {
        match fees {
            FeeMode::Embedded => self.signed_amount(),
            FeeMode::Separate => self.signed_amount() - self.fee,
        }
    }

    pub fn is_credit(&self) -> bool {
        self.direction == Direction::Credit
    }
}

/// Counters reported by the extraction layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ExtractionStats {
    /// Header rows found mid-table (a tampering signal)
    pub embedded_header_rows: usize,
    /// Rows failing the column-count or timestamp check
    pub skipped_rows: usize,
    /// Wrapped description rows folded into their predecessor
    pub continuation_rows: usize,
}

/// Engine input: one statement's transactions plus layout conventions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Statement {
    pub layout: Option<String>,
    pub transactions: Vec<Transaction>,
    pub conventions: LedgerConventions,
    pub extraction: ExtractionStats,
}

impl Statement {
    pub fn new(transactions: Vec<Transaction>, conventions: LedgerConventions) -> Self {
        Self {
            layout: None,
            transactions,
            conventions,
            extraction: ExtractionStats::default(),
        }
    }

    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    pub fn with_extraction(mut self, extraction: ExtractionStats) -> Self {
        self.extraction = extraction;
        self
    }
}

/// A transaction paired with its duplicate verdict, as the replay sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub tx: Transaction,
    pub is_duplicate: bool,
}
