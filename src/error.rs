//! Error types for gorseek
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using SeekError
pub type Result<T> = std::result::Result<T, SeekError>;

/// Unified error type for gorseek operations
#[derive(Debug, Error)]
pub enum SeekError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Data Errors
    // -------------------------------------------------------------------------
    #[error("Data format error: {0}")]
    DataFormat(String),

    #[error("Corrupt block in {path}: {message}")]
    CorruptBlock { path: String, message: String },

    // -------------------------------------------------------------------------
    // Index Errors
    // -------------------------------------------------------------------------
    #[error("Index error: {0}")]
    Index(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Iterator Errors
    // -------------------------------------------------------------------------
    #[error("Iterator is closed")]
    IteratorClosed,
}

impl SeekError {
    /// Shorthand for a `DataFormat` error
    pub(crate) fn data(msg: impl Into<String>) -> Self {
        SeekError::DataFormat(msg.into())
    }

    /// Whether this error is a data error (as opposed to a resource error)
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            SeekError::DataFormat(_) | SeekError::CorruptBlock { .. } | SeekError::Index(_)
        )
    }
}
