//! # Price Math
//!
//! Indicator calculations for daily price series.
//!
//! Streaming indicators (`update` one value at a time, then read `value`) live in
//! [`moving_averages`] and [`volatility`]. Whole-column helpers that map a price
//! column to an indicator column live in [`series`]; those are what the feature
//! frame is built from.

use thiserror::Error;

pub mod moving_averages;
pub mod series;
pub mod volatility;

pub use moving_averages::{ExponentialMovingAverage, SimpleMovingAverage};
pub use volatility::{BollingerBands, RollingStdDev};

/// Errors that can occur in indicator calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for indicator operations
pub type Result<T> = std::result::Result<T, MathError>;

pub(crate) fn validate_period(period: usize, name: &str) -> Result<()> {
    if period == 0 {
        return Err(MathError::InvalidInput(format!(
            "{} must be greater than zero",
            name
        )));
    }
    Ok(())
}
