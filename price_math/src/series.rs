//! Whole-column indicator helpers
//!
//! Each function maps an input column to an output column of the same length.
//! Positions whose trailing window is not yet full are `None`.

use crate::moving_averages::{ExponentialMovingAverage, SimpleMovingAverage};
use crate::volatility::{BollingerBands, RollingStdDev};
use crate::Result;

/// Bias-adjusted exponential moving average of a column
pub fn ewm_mean(values: &[f64], span: usize) -> Result<Vec<f64>> {
    let mut ema = ExponentialMovingAverage::new(span)?;
    values
        .iter()
        .map(|&v| {
            ema.update(v);
            ema.value()
        })
        .collect()
}

/// Trailing simple moving average of a column
pub fn rolling_mean(values: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    let mut sma = SimpleMovingAverage::new(window)?;
    Ok(values
        .iter()
        .map(|&v| {
            sma.update(v);
            sma.value().ok()
        })
        .collect())
}

/// Trailing sample standard deviation of a column
pub fn rolling_std(values: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    let mut std = RollingStdDev::new(window)?;
    Ok(values
        .iter()
        .map(|&v| {
            std.update(v);
            std.value().ok()
        })
        .collect())
}

/// First difference, `None` at position 0
pub fn diff(values: &[f64]) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(values.len());
    if values.is_empty() {
        return result;
    }
    result.push(None);
    result.extend(values.windows(2).map(|w| Some(w[1] - w[0])));
    result
}

/// Bollinger band columns computed over one price column
#[derive(Debug, Clone, PartialEq)]
pub struct BandColumns {
    pub middle: Vec<Option<f64>>,
    pub std_dev: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
    pub width: Vec<Option<f64>>,
}

/// Compute the middle, standard deviation, upper, lower and width columns
pub fn bollinger_bands(values: &[f64], window: usize, multiplier: f64) -> Result<BandColumns> {
    let mut bands = BollingerBands::new(window, multiplier)?;
    let n = values.len();
    let mut columns = BandColumns {
        middle: Vec::with_capacity(n),
        std_dev: Vec::with_capacity(n),
        upper: Vec::with_capacity(n),
        lower: Vec::with_capacity(n),
        width: Vec::with_capacity(n),
    };

    for &v in values {
        bands.update(v);
        columns.middle.push(bands.middle_band().ok());
        columns.std_dev.push(bands.std_dev().ok());
        columns.upper.push(bands.upper_band().ok());
        columns.lower.push(bands.lower_band().ok());
        columns.width.push(bands.band_width().ok());
    }

    Ok(columns)
}
