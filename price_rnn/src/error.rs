//! Error types for the price_rnn crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised anywhere in the forecasting pipeline
#[derive(Debug, Error)]
pub enum RnnError {
    /// Malformed or inconsistent input data
    #[error("Data error: {0}")]
    DataError(String),

    /// A requested column is not part of the feature frame
    #[error("'{0}' does not exist in the dataframe.")]
    MissingColumn(String),

    /// Not enough rows to build what was asked for
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Loading or running the sequence model failed
    #[error("Model error: {0}")]
    ModelError(String),

    /// Market data request failed
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// CSV encoding or decoding failed
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Indicator calculation failed
    #[error("Math error: {0}")]
    MathError(#[from] price_math::MathError),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, RnnError>;

impl From<PolarsError> for RnnError {
    fn from(err: PolarsError) -> Self {
        RnnError::PolarsError(err.to_string())
    }
}

impl From<reqwest::Error> for RnnError {
    fn from(err: reqwest::Error) -> Self {
        RnnError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for RnnError {
    fn from(err: serde_json::Error) -> Self {
        RnnError::SerializationError(err.to_string())
    }
}

impl From<csv::Error> for RnnError {
    fn from(err: csv::Error) -> Self {
        RnnError::CsvError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for RnnError {
    fn from(err: ndarray::ShapeError) -> Self {
        RnnError::DataError(format!("array shape mismatch: {}", err))
    }
}
