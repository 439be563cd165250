//! # Error Types
//!
//! Custom error types for Padsleep using `thiserror`.

use thiserror::Error;

/// Main error type for Padsleep
#[derive(Debug, Error)]
pub enum PadsleepError {
    /// Raw input device errors (open, state read-out)
    #[error("Input device error: {0}")]
    Input(String),

    /// Wireless transport errors reported by BlueZ
    #[error("Wireless transport error: {0}")]
    Wireless(String),

    /// The wireless transport could not be reached at all
    #[error("Wireless transport unavailable: {0}")]
    TransportUnavailable(String),

    /// The OS attribute query could not produce output
    #[error("Attribute query failed: {0}")]
    AttributeQuery(String),

    /// Invalid timing constants
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bluer::Error> for PadsleepError {
    fn from(err: bluer::Error) -> Self {
        PadsleepError::Wireless(err.to_string())
    }
}

/// Result type alias for Padsleep
pub type Result<T> = std::result::Result<T, PadsleepError>;
