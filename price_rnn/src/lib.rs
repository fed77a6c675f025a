//! # Price RNN
//!
//! Evaluation of pretrained recurrent networks that forecast a stock's adjusted
//! close from windows of technical-indicator features.
//!
//! ## Features
//!
//! - Daily history from the Yahoo Finance chart API, with an optional CSV cache
//! - EMA, MACD and Bollinger Band features on a polars data frame
//! - Per-column min-max scaling and sliding windows with a configurable lookahead
//! - Stacked LSTM/GRU inference, optionally bidirectional, with JSON weights
//! - Mean absolute error in price units, one-step-past-the-data forecast and
//!   directional accuracy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use price_rnn::{Pipeline, PipelineConfig, YahooFinanceClient};
//!
//! let config = PipelineConfig::from_json_file("config.json")?;
//! let pipeline = Pipeline::new(config)?;
//! let report = pipeline.run(&YahooFinanceClient::new()?)?;
//! println!("{}", report);
//! # Ok::<(), price_rnn::RnnError>(())
//! ```

pub mod buffer;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod scaling;
pub mod utils;
pub mod windowing;

// Re-export commonly used types
pub use crate::config::PipelineConfig;
pub use crate::data::{CsvPriceCache, MarketDataProvider, PriceBar, PriceSeries, YahooFinanceClient};
pub use crate::error::{Result, RnnError};
pub use crate::features::FeatureFrame;
pub use crate::metrics::{directional_accuracy, ComparisonSeries, LossKind};
pub use crate::model::{CellType, NetworkConfig, RecurrentNetwork, SequenceModel};
pub use crate::pipeline::{Pipeline, PipelineReport, PreparedData};
pub use crate::scaling::{ColumnScalers, MinMaxScaler};
pub use crate::windowing::{DatasetSplit, WindowedDataset};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
