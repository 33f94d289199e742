//! mmrecon-ingest: extracted statement tables -> canonical `Statement`, plus the
//! vendor layouts the detector knows about.

pub mod detect;
pub mod document;
pub mod layouts;
pub mod mapper;
pub mod normalize;

pub use detect::{DetectedBy, Detection, detect_layout};
pub use document::{Document, ExtractedTable, Page, RawRow};
pub use layouts::Layout;
pub use mapper::{Extraction, map_rows};

use mmrecon_core::{ReconConfig, ReconError, Result, Statement, StatementReport};
use tracing::info;

/// Detect the layout and map every row into a `Statement`.
pub fn extract_statement(doc: &Document, cfg: &ReconConfig) -> Result<Statement> {
    let detection = detect_layout(doc).ok_or(ReconError::FormatUnrecognized)?;
    let extraction = map_rows(doc, &detection, cfg)?;
    let spec = extraction.layout.spec();
    info!(
        layout = spec.name,
        via = ?detection.via,
        rows = extraction.transactions.len(),
        "statement extracted"
    );
    Ok(Statement::new(extraction.transactions, spec.conventions)
        .with_layout(spec.name)
        .with_extraction(extraction.stats))
}

/// Extraction followed by reconciliation.
pub fn reconcile_document(doc: &Document, cfg: &ReconConfig) -> Result<StatementReport> {
    let statement = extract_statement(doc, cfg)?;
    mmrecon_core::reconcile(statement, cfg)
}
