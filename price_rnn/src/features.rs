//! Feature frame: raw prices plus derived technical indicators
//!
//! Derived columns are computed once over the whole series, in dependency order.
//! Rows whose trailing window is not yet full hold nulls; they are kept here and
//! only dropped when windows are built.

use crate::data::PriceSeries;
use crate::error::{Result, RnnError};
use chrono::NaiveTime;
use polars::prelude::*;
use price_math::series::{bollinger_bands, diff, ewm_mean};

/// Column names used in the feature frame
pub mod columns {
    pub const DATE: &str = "date";
    pub const OPEN: &str = "open";
    pub const HIGH: &str = "high";
    pub const LOW: &str = "low";
    pub const CLOSE: &str = "close";
    pub const ADJCLOSE: &str = "adjclose";
    pub const VOLUME: &str = "volume";

    pub const EMA_12: &str = "12 Day EMA";
    pub const EMA_26: &str = "26 Day EMA";
    pub const MACD: &str = "MACD";
    pub const MOVING_AVERAGE: &str = "30 Day MA";
    pub const MOVING_STD: &str = "30 Day STD";
    pub const UPPER_BAND: &str = "Upper Band";
    pub const LOWER_BAND: &str = "Lower Band";
    pub const BAND_WIDTH: &str = "Upper to Lower Diff";
    pub const MACD_SIGNAL: &str = "9 Day MACD EMA";
    pub const MACD_HISTOGRAM: &str = "MACD Convergence/Divergence";
    pub const HISTOGRAM_CHANGE: &str = "Divergence Change";
}

/// Feature columns used when none are configured
pub const DEFAULT_FEATURE_COLUMNS: [&str; 11] = [
    columns::ADJCLOSE,
    columns::VOLUME,
    columns::OPEN,
    columns::HIGH,
    columns::LOW,
    columns::MACD,
    columns::MOVING_AVERAGE,
    columns::UPPER_BAND,
    columns::LOWER_BAND,
    columns::BAND_WIDTH,
    columns::MACD_HISTOGRAM,
];

/// Indicator windows. The moving-average window keeps its historical column name.
const FAST_EMA_SPAN: usize = 12;
const SLOW_EMA_SPAN: usize = 26;
const SIGNAL_EMA_SPAN: usize = 9;
const BAND_WINDOW: usize = 20;
const BAND_STD_MULTIPLIER: f64 = 2.0;

/// Table of per-day features backed by a polars `DataFrame`
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    df: DataFrame,
}

impl FeatureFrame {
    /// Frame with only the raw price columns
    pub fn from_prices(series: &PriceSeries) -> Result<Self> {
        let bars = series.bars();
        let dates: Vec<i64> = bars
            .iter()
            .map(|b| b.date.and_time(NaiveTime::default()).and_utc().timestamp_millis())
            .collect();

        let df = DataFrame::new(vec![
            Series::new(columns::DATE, dates),
            Series::new(columns::OPEN, bars.iter().map(|b| b.open).collect::<Vec<f64>>()),
            Series::new(columns::HIGH, bars.iter().map(|b| b.high).collect::<Vec<f64>>()),
            Series::new(columns::LOW, bars.iter().map(|b| b.low).collect::<Vec<f64>>()),
            Series::new(columns::CLOSE, bars.iter().map(|b| b.close).collect::<Vec<f64>>()),
            Series::new(
                columns::ADJCLOSE,
                bars.iter().map(|b| b.adjclose).collect::<Vec<f64>>(),
            ),
            Series::new(
                columns::VOLUME,
                bars.iter().map(|b| b.volume).collect::<Vec<f64>>(),
            ),
        ])?;

        Ok(Self { df })
    }

    /// Frame with the raw price columns and every derived indicator
    pub fn with_indicators(series: &PriceSeries) -> Result<Self> {
        let mut frame = Self::from_prices(series)?;
        frame.add_indicators()?;
        Ok(frame)
    }

    /// Append the derived indicator columns computed from `adjclose`
    pub fn add_indicators(&mut self) -> Result<()> {
        let adjclose = self.dense_column(columns::ADJCLOSE)?;

        let ema_fast = ewm_mean(&adjclose, FAST_EMA_SPAN)?;
        let ema_slow = ewm_mean(&adjclose, SLOW_EMA_SPAN)?;
        let macd: Vec<f64> = ema_fast
            .iter()
            .zip(&ema_slow)
            .map(|(fast, slow)| fast - slow)
            .collect();

        let bands = bollinger_bands(&adjclose, BAND_WINDOW, BAND_STD_MULTIPLIER)?;

        let signal = ewm_mean(&macd, SIGNAL_EMA_SPAN)?;
        let histogram: Vec<f64> = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();
        let histogram_change = diff(&histogram);

        self.set_dense(columns::EMA_12, ema_fast)?;
        self.set_dense(columns::EMA_26, ema_slow)?;
        self.set_dense(columns::MACD, macd)?;
        self.set_column(columns::MOVING_AVERAGE, bands.middle)?;
        self.set_column(columns::MOVING_STD, bands.std_dev)?;
        self.set_column(columns::UPPER_BAND, bands.upper)?;
        self.set_column(columns::LOWER_BAND, bands.lower)?;
        self.set_column(columns::BAND_WIDTH, bands.width)?;
        self.set_dense(columns::MACD_SIGNAL, signal)?;
        self.set_dense(columns::MACD_HISTOGRAM, histogram)?;
        self.set_column(columns::HISTOGRAM_CHANGE, histogram_change)?;

        log::debug!(
            "feature frame has {} rows and {} columns",
            self.height(),
            self.df.width()
        );
        Ok(())
    }

    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.get_column_names().iter().any(|c| *c == name)
    }

    /// Fail with the first name in `names` that is not a column of this frame
    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        match names.iter().find(|name| !self.has_column(name.as_ref())) {
            Some(missing) => Err(RnnError::MissingColumn(missing.as_ref().to_string())),
            None => Ok(()),
        }
    }

    /// Column values as f64, nulls preserved
    pub fn column_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        if !self.has_column(name) {
            return Err(RnnError::MissingColumn(name.to_string()));
        }
        let series = self.df.column(name)?.cast(&DataType::Float64)?;
        let values = series.f64()?.into_iter().collect();
        Ok(values)
    }

    /// Column values as f64, failing on any null
    pub fn dense_column(&self, name: &str) -> Result<Vec<f64>> {
        self.column_values(name)?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value.ok_or_else(|| {
                    RnnError::DataError(format!("column '{}' is missing a value at row {}", name, row))
                })
            })
            .collect()
    }

    /// Insert or replace a column; `values` must have one entry per row
    pub fn set_column(&mut self, name: &str, values: Vec<Option<f64>>) -> Result<()> {
        if values.len() != self.height() {
            return Err(RnnError::DataError(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.height()
            )));
        }
        self.df.with_column(Series::new(name, values))?;
        Ok(())
    }

    fn set_dense(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        self.set_column(name, values.into_iter().map(Some).collect())
    }
}
