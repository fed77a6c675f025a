//! Volatility indicator implementations
//!
//! - Rolling sample standard deviation
//! - Bollinger Bands built on top of it

use crate::moving_averages::SimpleMovingAverage;
use crate::{validate_period, MathError, Result};
use std::collections::VecDeque;

/// Rolling sample standard deviation (`ddof = 1`) over a trailing window
#[derive(Debug, Clone)]
pub struct RollingStdDev {
    period: usize,
    values: VecDeque<f64>,
}

impl RollingStdDev {
    /// Create a rolling standard deviation over `period` values
    pub fn new(period: usize) -> Result<Self> {
        validate_period(period, "Period")?;
        if period < 2 {
            return Err(MathError::InvalidInput(
                "Sample standard deviation needs a window of at least 2".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period),
        })
    }

    /// Push a new value, evicting the oldest once the window is full
    pub fn update(&mut self, value: f64) {
        self.values.push_back(value);
        if self.values.len() > self.period {
            self.values.pop_front();
        }
    }

    /// Whether a full window has been seen
    pub fn is_ready(&self) -> bool {
        self.values.len() >= self.period
    }

    /// Sample standard deviation of the current window
    pub fn value(&self) -> Result<f64> {
        if !self.is_ready() {
            return Err(MathError::InsufficientData(format!(
                "Not enough data to calculate standard deviation. Need {} values, have {}.",
                self.period,
                self.values.len()
            )));
        }

        let n = self.values.len() as f64;
        let mean = self.values.iter().sum::<f64>() / n;
        let variance = self
            .values
            .iter()
            .map(|&v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / (n - 1.0);

        Ok(variance.sqrt())
    }

    /// Get the current period
    pub fn period(&self) -> usize {
        self.period
    }

    /// Clear the window
    pub fn reset(&mut self) {
        self.values.clear();
    }
}

/// Bollinger Bands: moving average plus/minus a multiple of the rolling
/// sample standard deviation.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    std_dev_multiplier: f64,
    sma: SimpleMovingAverage,
    std_dev: RollingStdDev,
}

impl BollingerBands {
    /// Create a new Bollinger Bands with the specified parameters
    pub fn new(period: usize, std_dev_multiplier: f64) -> Result<Self> {
        if std_dev_multiplier <= 0.0 {
            return Err(MathError::InvalidInput(
                "Standard deviation multiplier must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            std_dev_multiplier,
            sma: SimpleMovingAverage::new(period)?,
            std_dev: RollingStdDev::new(period)?,
        })
    }

    /// Update the bands with a new price value
    pub fn update(&mut self, price: f64) {
        self.sma.update(price);
        self.std_dev.update(price);
    }

    /// Whether a full window has been seen
    pub fn is_ready(&self) -> bool {
        self.sma.is_ready()
    }

    /// Get the current middle band (SMA)
    pub fn middle_band(&self) -> Result<f64> {
        self.sma.value()
    }

    /// Current rolling standard deviation
    pub fn std_dev(&self) -> Result<f64> {
        self.std_dev.value()
    }

    /// Get the current upper band (SMA + multiplier * std_dev)
    pub fn upper_band(&self) -> Result<f64> {
        Ok(self.middle_band()? + self.std_dev()? * self.std_dev_multiplier)
    }

    /// Get the current lower band (SMA - multiplier * std_dev)
    pub fn lower_band(&self) -> Result<f64> {
        Ok(self.middle_band()? - self.std_dev()? * self.std_dev_multiplier)
    }

    /// Absolute distance between the upper and lower band
    pub fn band_width(&self) -> Result<f64> {
        Ok(self.upper_band()? - self.lower_band()?)
    }

    /// Get the current period
    pub fn period(&self) -> usize {
        self.sma.period()
    }

    /// Get the standard deviation multiplier
    pub fn std_dev_multiplier(&self) -> f64 {
        self.std_dev_multiplier
    }

    /// Reset the bands, clearing all values
    pub fn reset(&mut self) {
        self.sma.reset();
        self.std_dev.reset();
    }
}
