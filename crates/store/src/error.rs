//! Store error type

/// Failures from the store and its engines.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A `/regex/` filter element failed to compile.
    #[error("bad filter pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Database-level failure.
    #[error("database error: {0}")]
    Database(#[from] turso::Error),

    /// Filesystem failure while opening the database.
    #[error("storage i/o: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}
