//! mmrecon-core: balance reconciliation engine for mobile-money statements

pub mod config;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod model;
pub mod replay;
pub mod resolver;
pub mod rules;
pub mod verdict;

pub use config::{PatternConfig, ReconConfig, RulePatterns};
pub use duplicates::detect_duplicates;
pub use engine::{StatementReport, StatementSummary, reconcile, reconcile_all};
pub use error::{ReconError, Result};
pub use model::{
    Direction, ExtractionStats, FeeMode, IdReliability, LedgerConventions, LedgerRow,
    QualityFlag, SourceRef, SpecialKind, Statement, Transaction, TxStatus,
};
pub use replay::{ReconciliationResult, ReplayState, replay};
pub use resolver::{BatchResolution, OrderStrategy, resolve_order};
pub use rules::{ExcludedRow, ExclusionReason, apply_business_rules, classify_description};
pub use verdict::{Verdict, VerdictThresholds, classify};
