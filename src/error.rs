//! Error types for milan-match.

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Matching error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested operation was configured inconsistently
    /// (wrong table count for a mode, mismatched option arity, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// An operation that requires random row access was attempted on a
    /// table that only supports sequential scanning.
    #[error("table {0} does not provide random access")]
    NonRandomTable(usize),

    /// A table implementation failed to deliver a row.
    #[error("table access failed: {0}")]
    Table(String),

    /// The progress sink raised an interruption; the whole operation
    /// aborts and no partial result is retained.
    #[error("operation interrupted")]
    Interrupted,
}
