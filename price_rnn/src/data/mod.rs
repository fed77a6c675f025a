//! Daily price data and where it comes from

use crate::error::{Result, RnnError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub mod yahoo;

pub use yahoo::YahooFinanceClient;

/// One trading day of prices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Close adjusted for dividends and splits
    pub adjclose: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Every price and the volume are finite numbers
    pub fn is_finite(&self) -> bool {
        [
            self.open,
            self.high,
            self.low,
            self.close,
            self.adjclose,
            self.volume,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Date-ordered daily prices for a single ticker
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series, ordering bars by date
    pub fn new(ticker: impl Into<String>, mut bars: Vec<PriceBar>) -> Result<Self> {
        let ticker = ticker.into();
        if bars.is_empty() {
            return Err(RnnError::DataError(format!(
                "no price data for ticker '{}'",
                ticker
            )));
        }

        if let Some(bar) = bars.iter().find(|bar| !bar.is_finite()) {
            return Err(RnnError::DataError(format!(
                "non-finite price or volume on {} for ticker '{}'",
                bar.date, ticker
            )));
        }

        bars.sort_by_key(|bar| bar.date);
        if let Some(pair) = bars.windows(2).find(|pair| pair[0].date == pair[1].date) {
            return Err(RnnError::DataError(format!(
                "duplicate trading day {} for ticker '{}'",
                pair[0].date, ticker
            )));
        }

        Ok(Self { ticker, bars })
    }

    /// Series from bars already known to be non-empty, sorted and unique
    pub(crate) fn from_ordered(ticker: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        Self {
            ticker: ticker.into(),
            bars,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    pub fn adjclose(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.adjclose).collect()
    }

    /// Date of the most recent bar
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

/// Source of daily price history
pub trait MarketDataProvider {
    /// Fetch the full daily history available for `ticker`
    fn fetch_daily(&self, ticker: &str) -> Result<PriceSeries>;
}

/// Price series stored as CSV on disk
#[derive(Debug, Clone)]
pub struct CsvPriceCache {
    path: PathBuf,
}

impl CsvPriceCache {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write every bar of `series`, creating parent directories as needed
    pub fn save(&self, series: &PriceSeries) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::Writer::from_path(&self.path)?;
        for bar in series.bars() {
            writer.serialize(bar)?;
        }
        writer.flush()?;

        log::info!(
            "cached {} bars for {} at {}",
            series.len(),
            series.ticker(),
            self.path.display()
        );
        Ok(())
    }

    /// Read the cached bars back as a series for `ticker`
    pub fn load(&self, ticker: &str) -> Result<PriceSeries> {
        let file = File::open(&self.path)?;
        let mut reader = csv::Reader::from_reader(file);
        let bars = reader
            .deserialize()
            .collect::<std::result::Result<Vec<PriceBar>, csv::Error>>()?;

        PriceSeries::new(ticker, bars)
    }
}

impl MarketDataProvider for CsvPriceCache {
    fn fetch_daily(&self, ticker: &str) -> Result<PriceSeries> {
        self.load(ticker)
    }
}
