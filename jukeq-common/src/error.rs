//! Common error types for JukeQ

use thiserror::Error;

/// Common result type for JukeQ operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across JukeQ crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown request status value
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// Status transition not permitted by the request lifecycle
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Per-user pending request quota reached
    #[error("Request quota exceeded (limit {limit})")]
    QuotaExceeded { limit: i64 },

    /// Transient write conflict that persisted past the retry budget
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
