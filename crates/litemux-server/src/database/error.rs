//! Server error types.

use thiserror::Error;

/// Errors surfaced to a connection.
///
/// Every request-path failure is forwarded unchanged to the protocol
/// layer, which owns the wire encoding; nothing is retried or suppressed
/// on the way out.
#[derive(Debug, Error)]
pub enum ServerError {
    /// SQLite rejected an open, prepare, execute or row scan.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The statement failed the validation parse (prepare path only;
    /// plain statements fall back to raw execution instead).
    #[error("parse error: {0}")]
    Parse(#[from] sqlparser::parser::ParserError),

    /// Filesystem error while scanning the data directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation this endpoint never services.
    #[error("{0} not supported")]
    Unsupported(&'static str),
}

/// Result type alias for server operations.
pub type ServerResult<T> = std::result::Result<T, ServerError>;
