//! Per-column min-max scaling

use crate::error::{Result, RnnError};
use crate::features::FeatureFrame;
use std::collections::HashMap;

/// Maps a column into `[0, 1]` using the min and max it was fitted on.
///
/// A constant column has a zero range; it is treated as a range of one so that
/// every value maps to zero instead of dividing by zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    /// Fit on every finite value, ignoring missing entries
    pub fn fit<I>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let (min, max) = values
            .into_iter()
            .flatten()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });

        if min > max {
            return Err(RnnError::InsufficientData(
                "cannot fit a scaler on a column without values".to_string(),
            ));
        }

        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// `max - min`, or 1 for a constant column
    pub fn range(&self) -> f64 {
        let range = self.max - self.min;
        if range == 0.0 {
            1.0
        } else {
            range
        }
    }

    /// `(x - min) / (max - min)`
    pub fn transform(&self, value: f64) -> f64 {
        (value - self.min) / self.range()
    }

    /// Inverse of [`transform`](Self::transform) for a value
    pub fn inverse_transform(&self, scaled: f64) -> f64 {
        scaled * self.range() + self.min
    }

    /// Convert a scaled difference or error back to original units.
    ///
    /// Differences carry no offset, so only the range applies.
    pub fn scale_error(&self, scaled_error: f64) -> f64 {
        scaled_error * self.range()
    }
}

/// One fitted scaler per feature column, keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnScalers {
    scalers: HashMap<String, MinMaxScaler>,
}

impl ColumnScalers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, scaler: MinMaxScaler) {
        self.scalers.insert(column.into(), scaler);
    }

    pub fn get(&self, column: &str) -> Option<&MinMaxScaler> {
        self.scalers.get(column)
    }

    /// Scaler for `column`, or an error naming the column
    pub fn require(&self, column: &str) -> Result<&MinMaxScaler> {
        self.scalers.get(column).ok_or_else(|| {
            RnnError::DataError(format!("no scaler was fitted for column '{}'", column))
        })
    }

    pub fn len(&self) -> usize {
        self.scalers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scalers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MinMaxScaler)> {
        self.scalers.iter()
    }
}

/// Fit one scaler per column and replace each column with its scaled values
pub fn scale_features<S: AsRef<str>>(
    frame: &mut FeatureFrame,
    columns: &[S],
) -> Result<ColumnScalers> {
    frame.require_columns(columns)?;

    let mut scalers = ColumnScalers::new();
    for column in columns {
        let column = column.as_ref();
        if scalers.get(column).is_some() {
            return Err(RnnError::InvalidParameter(format!(
                "column '{}' requested twice for scaling",
                column
            )));
        }

        let values = frame.column_values(column)?;
        let scaler = MinMaxScaler::fit(values.iter().copied())?;
        let scaled = values
            .into_iter()
            .map(|v| v.map(|x| scaler.transform(x)))
            .collect();
        frame.set_column(column, scaled)?;

        log::debug!(
            "scaled '{}' with min {:.4} and max {:.4}",
            column,
            scaler.min(),
            scaler.max()
        );
        scalers.insert(column, scaler);
    }

    Ok(scalers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fit_ignores_missing_values() {
        let scaler = MinMaxScaler::fit(vec![None, Some(4.0), Some(2.0), None, Some(10.0)]).unwrap();
        assert_eq!(scaler.min(), 2.0);
        assert_eq!(scaler.max(), 10.0);
        assert_relative_eq!(scaler.transform(6.0), 0.5);
    }

    #[test]
    fn fit_on_empty_column_fails() {
        assert!(MinMaxScaler::fit(vec![None, None]).is_err());
    }

    #[test]
    fn scaled_frame_inverts_to_original_prices() {
        let series = crate::utils::generate_price_series("XLK", 80, 100.0, 9);
        let original = FeatureFrame::with_indicators(&series).unwrap();
        let mut frame = original.clone();
        let columns = ["adjclose", "volume", "30 Day MA"];
        let scalers = scale_features(&mut frame, &columns).unwrap();
        assert_eq!(scalers.len(), 3);

        for column in columns {
            let scaler = scalers.require(column).unwrap();
            let before = original.column_values(column).unwrap();
            let after = frame.column_values(column).unwrap();
            for (raw, scaled) in before.iter().zip(&after) {
                match (raw, scaled) {
                    (Some(raw), Some(scaled)) => {
                        assert!((0.0..=1.0).contains(scaled));
                        assert_relative_eq!(scaler.inverse_transform(*scaled), *raw, max_relative = 1e-12);
                    }
                    (None, None) => {}
                    _ => panic!("null mask changed in '{}'", column),
                }
            }
        }
    }

    #[test]
    fn duplicate_column_is_rejected() {
        let series = crate::utils::generate_price_series("XLK", 10, 100.0, 9);
        let mut frame = FeatureFrame::from_prices(&series).unwrap();
        assert!(matches!(
            scale_features(&mut frame, &["adjclose", "adjclose"]),
            Err(RnnError::InvalidParameter(_))
        ));
    }

    #[test]
    fn constant_column_maps_to_zero() {
        let scaler = MinMaxScaler::fit(vec![Some(3.0), Some(3.0)]).unwrap();
        assert_eq!(scaler.transform(3.0), 0.0);
        assert_eq!(scaler.inverse_transform(0.0), 3.0);
    }

    #[test]
    fn error_scaling_drops_the_offset() {
        let scaler = MinMaxScaler::fit(vec![Some(100.0), Some(150.0)]).unwrap();
        assert_relative_eq!(scaler.scale_error(0.1), 5.0);
        // the value inverse would add the minimum back
        assert_relative_eq!(scaler.inverse_transform(0.1), 105.0);
    }
}
