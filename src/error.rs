//! Error handling for Concilia
//!
//! Defines custom error types and establishes a unified Result type
//! using anyhow for context chaining and error propagation.

use thiserror::Error;

/// Core error types for reconciliation operations
#[derive(Error, Debug)]
pub enum ConciliaError {
    #[error("database error: {0}")]
    Db(String),

    /// Structural parse failure: unreadable file or missing required columns.
    /// Fatal to the current upload; no partial data is produced.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

/// Result type alias for reconciliation operations
pub type Result<T> = anyhow::Result<T>;
