//! Error types for the skin_forecast crate

use thiserror::Error;

/// Custom error types for the skin_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// One or more required columns are missing from the input table
    #[error("Schema error: missing required column(s): {}", .0.join(", "))]
    Schema(Vec<String>),

    /// The input series has no rows
    #[error("Empty series: no rows to build a forecast context from")]
    EmptySeries,

    /// Error related to data parsing or conversion
    #[error("Data error: {0}")]
    Data(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The context window is longer than the backend accepts
    #[error("Context overflow: {rows} context rows exceed the backend maximum of {max}")]
    ContextOverflow { rows: usize, max: usize },

    /// The forecasting backend failed or returned malformed output
    #[error("Backend error: {0}")]
    Backend(String),

    /// The backend returned a different number of rows than requested
    #[error("Index mismatch: backend returned {actual} rows for a horizon of {expected}")]
    IndexMismatch { expected: usize, actual: usize },

    /// Every identifier of a batch failed
    #[error("Batch exhausted: all {attempted} series failed to forecast")]
    BatchExhausted { attempted: usize },

    /// The batch was cancelled before this series was started
    #[error("Cancelled before the forecast was started")]
    Cancelled,

    /// Error from configuration loading or validation
    #[error("Config error: {0}")]
    Config(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    Polars(String),
}

impl ForecastError {
    /// Whether the error belongs to the backend family (call failure, malformed
    /// output, or a context the backend cannot accept).
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            ForecastError::Backend(_)
                | ForecastError::IndexMismatch { .. }
                | ForecastError::ContextOverflow { .. }
        )
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<polars::prelude::PolarsError> for ForecastError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        ForecastError::Polars(err.to_string())
    }
}

impl From<toml::de::Error> for ForecastError {
    fn from(err: toml::de::Error) -> Self {
        ForecastError::Config(err.to_string())
    }
}
