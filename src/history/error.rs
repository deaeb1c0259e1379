use thiserror::Error;

/// History writer errors
///
/// Only the append path and startup surface errors to callers. Statement
/// execution failures are retried inside the pool and never reach the engine.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Text field too long: escaped length {len} exceeds {max} bytes")]
    TextTooLong { len: usize, max: usize },

    #[error("Invalid timestamp: {0}")]
    InvalidTime(f64),

    #[error("Initialization failed: {0}")]
    Init(String),

    #[error("Database connection failed: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("Statement execution failed: {0}")]
    Execute(String),

    #[error("History service is stopped")]
    Stopped,

    #[error("Configuration error: {0}")]
    Config(String),
}
