//! Moving average calculation implementations
//!
//! - Simple Moving Average (SMA) over a fixed trailing window
//! - Exponential Moving Average (EMA) with span-based smoothing

use crate::{validate_period, MathError, Result};
use std::collections::VecDeque;

/// Simple Moving Average (SMA) implementation
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl SimpleMovingAverage {
    /// Create a new Simple Moving Average with the specified period
    pub fn new(period: usize) -> Result<Self> {
        validate_period(period, "Period")?;

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period),
            sum: 0.0,
        })
    }

    /// Update the SMA with a new value
    pub fn update(&mut self, value: f64) {
        self.values.push_back(value);
        self.sum += value;

        if self.values.len() > self.period {
            if let Some(old_value) = self.values.pop_front() {
                self.sum -= old_value;
            }
        }
    }

    /// Whether a full window has been seen
    pub fn is_ready(&self) -> bool {
        self.values.len() >= self.period
    }

    /// Get the current SMA value
    pub fn value(&self) -> Result<f64> {
        if !self.is_ready() {
            return Err(MathError::InsufficientData(format!(
                "Not enough data for SMA calculation. Need {} values, have {}.",
                self.period,
                self.values.len()
            )));
        }

        Ok(self.sum / self.period as f64)
    }

    /// Get the current period
    pub fn period(&self) -> usize {
        self.period
    }

    /// Reset the SMA, clearing all values
    pub fn reset(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }
}

/// Exponential Moving Average (EMA) with bias-adjusted weighting.
///
/// Each observation `x[t-i]` carries weight `(1 - alpha)^i` with
/// `alpha = 2 / (span + 1)`, and the weighted sum is divided by the sum of the
/// weights. The average is therefore defined from the very first value, which
/// matches `ewm(span=..., adjust=True).mean()` as used by most dataframe
/// libraries.
#[derive(Debug, Clone)]
pub struct ExponentialMovingAverage {
    span: usize,
    alpha: f64,
    weighted_sum: f64,
    weight_total: f64,
}

impl ExponentialMovingAverage {
    /// Create a new Exponential Moving Average with the specified span
    pub fn new(span: usize) -> Result<Self> {
        validate_period(span, "Span")?;

        Ok(Self {
            span,
            alpha: 2.0 / (span as f64 + 1.0),
            weighted_sum: 0.0,
            weight_total: 0.0,
        })
    }

    /// Update the EMA with a new value
    pub fn update(&mut self, value: f64) {
        let decay = 1.0 - self.alpha;
        self.weighted_sum = value + decay * self.weighted_sum;
        self.weight_total = 1.0 + decay * self.weight_total;
    }

    /// Get the current EMA value
    pub fn value(&self) -> Result<f64> {
        if self.weight_total == 0.0 {
            return Err(MathError::InsufficientData(
                "EMA has not seen any values".to_string(),
            ));
        }

        Ok(self.weighted_sum / self.weight_total)
    }

    /// Smoothing factor derived from the span
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Get the configured span
    pub fn span(&self) -> usize {
        self.span
    }

    /// Reset the EMA, clearing all values
    pub fn reset(&mut self) {
        self.weighted_sum = 0.0;
        self.weight_total = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sma_calculation() {
        let mut sma = SimpleMovingAverage::new(3).unwrap();

        assert!(sma.value().is_err());

        sma.update(2.0);
        sma.update(4.0);
        assert!(sma.value().is_err());

        sma.update(6.0);
        assert_eq!(sma.value().unwrap(), 4.0);

        // The window slides, dropping the oldest value
        sma.update(8.0);
        assert_eq!(sma.value().unwrap(), 6.0);
    }

    #[test]
    fn test_sma_reset() {
        let mut sma = SimpleMovingAverage::new(2).unwrap();
        sma.update(1.0);
        sma.update(2.0);
        assert!(sma.is_ready());

        sma.reset();
        assert!(!sma.is_ready());
        assert!(sma.value().is_err());
    }

    #[test]
    fn test_ema_first_value_is_identity() {
        let mut ema = ExponentialMovingAverage::new(12).unwrap();
        assert!(ema.value().is_err());

        ema.update(42.0);
        assert_relative_eq!(ema.value().unwrap(), 42.0);
    }

    #[test]
    fn test_ema_adjusted_weights() {
        // span 3 -> alpha 0.5, weights 1, 0.5, 0.25 (newest first)
        let mut ema = ExponentialMovingAverage::new(3).unwrap();
        assert_relative_eq!(ema.alpha(), 0.5);

        ema.update(2.0);
        ema.update(4.0);
        assert_relative_eq!(ema.value().unwrap(), (4.0 + 0.5 * 2.0) / 1.5);

        ema.update(6.0);
        let expected = (6.0 + 0.5 * 4.0 + 0.25 * 2.0) / (1.0 + 0.5 + 0.25);
        assert_relative_eq!(ema.value().unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_span_rejected() {
        assert!(ExponentialMovingAverage::new(0).is_err());
        assert!(SimpleMovingAverage::new(0).is_err());
    }
}
