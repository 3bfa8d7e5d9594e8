//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur during telemetry setup.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The log directive string or level filter could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A global subscriber is already installed.
    #[error("initialization error: {0}")]
    Init(String),

    /// The log file or its parent directory could not be opened.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
