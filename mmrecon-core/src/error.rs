use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReconError>;

#[derive(Debug, Error)]
pub enum ReconError {
    /// No supported layout matched the title text or any header row.
    #[error("statement layout not recognised")]
    FormatUnrecognized,

    /// A layout matched but no row passed the column-count and timestamp checks.
    #[error("no data extracted from {layout} statement")]
    NoDataExtracted { layout: String },

    /// Every transaction was removed by the business rules.
    #[error("nothing to replay: all {excluded} transactions were excluded")]
    NothingToReplay { excluded: usize },

    /// A numeric or required field could not be parsed even after repair.
    #[error("page {page}, row {row}: unrepairable {field} value '{value}'")]
    FieldCorruptionUnrepairable {
        page: usize,
        row: usize,
        field: &'static str,
        value: String,
    },

    #[error("invalid pattern '{name}': {source}")]
    InvalidPattern {
        name: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("invalid config: {0}")]
    Config(String),
}
