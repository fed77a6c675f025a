//! Run configuration
//!
//! Every tunable of a run lives in [`PipelineConfig`]. It is plain data passed
//! into [`crate::pipeline::Pipeline`]; nothing is read from global state.

use crate::error::{Result, RnnError};
use crate::features::{columns, DEFAULT_FEATURE_COLUMNS};
use crate::metrics::LossKind;
use crate::model::naming::ModelName;
use crate::model::{CellType, NetworkConfig};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Parameters for one evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ticker symbol to fetch
    pub ticker: String,
    /// Window size (sequence length)
    pub n_steps: usize,
    /// Days ahead the label is taken, 1 is the next day
    pub lookup_step: usize,
    /// Fraction of windows held out for testing
    pub test_size: f64,
    /// Shuffle (window, label) pairs before splitting
    pub shuffle: bool,
    /// Min-max scale the feature columns
    pub scale: bool,
    /// Columns fed to the model, in order
    pub feature_columns: Vec<String>,

    pub n_layers: usize,
    pub cell: CellType,
    pub units: usize,
    pub dropout: f64,
    pub bidirectional: bool,

    pub loss: LossKind,
    pub optimizer: String,
    pub batch_size: usize,

    /// Seed for the split shuffle
    pub seed: u64,

    /// Directory holding `<model name>.json` weight files
    pub results_dir: PathBuf,
    /// Directory for the price cache
    pub data_dir: PathBuf,
    /// Write the fetched series to `<data_dir>/<ticker>_<date>.csv`
    pub cache_prices: bool,
    /// Read prices from this CSV instead of the network
    pub price_csv: Option<PathBuf>,
    /// Prefix model names with this date, as `YYYY-MM-DD_`
    pub weights_date: Option<NaiveDate>,

    /// Number of trailing test points in the actual/predicted comparison
    pub comparison_points: usize,
    /// Write the comparison to this CSV
    pub comparison_csv: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ticker: "XLK".to_string(),
            n_steps: 100,
            lookup_step: 1,
            test_size: 0.2,
            shuffle: false,
            scale: true,
            feature_columns: DEFAULT_FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            n_layers: 3,
            cell: CellType::Lstm,
            units: 256,
            dropout: 0.4,
            bidirectional: false,
            loss: LossKind::Huber,
            optimizer: "adam".to_string(),
            batch_size: 64,
            seed: 300,
            results_dir: PathBuf::from("results"),
            data_dir: PathBuf::from("data"),
            cache_prices: false,
            price_csv: None,
            weights_date: None,
            comparison_points: 200,
            comparison_csv: None,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; missing keys take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Check parameter ranges and column consistency
    pub fn validate(&self) -> Result<()> {
        if self.ticker.trim().is_empty() {
            return Err(invalid("ticker must not be empty"));
        }
        if self.n_steps == 0 {
            return Err(invalid("n_steps must be at least 1"));
        }
        if self.lookup_step == 0 {
            return Err(invalid("lookup_step must be at least 1"));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(invalid("test_size must be between 0 and 1 (exclusive)"));
        }
        if self.feature_columns.is_empty() {
            return Err(invalid("feature_columns must not be empty"));
        }

        let mut seen = HashSet::new();
        for column in &self.feature_columns {
            if !seen.insert(column.as_str()) {
                return Err(invalid(&format!("feature column '{}' listed twice", column)));
            }
        }
        if self.scale && !seen.contains(columns::ADJCLOSE) {
            return Err(invalid(
                "feature_columns must include 'adjclose' when scaling, predictions are inverted through its scaler",
            ));
        }

        if self.n_layers == 0 {
            return Err(invalid("n_layers must be at least 1"));
        }
        if self.units == 0 {
            return Err(invalid("units must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(invalid("dropout must be in [0, 1)"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size must be at least 1"));
        }
        if self.optimizer.trim().is_empty() {
            return Err(invalid("optimizer must not be empty"));
        }

        Ok(())
    }

    /// Network shape implied by this configuration
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            cell: self.cell,
            input_size: self.feature_columns.len(),
            units: self.units,
            layers: self.n_layers,
            dropout: self.dropout,
            bidirectional: self.bidirectional,
        }
    }

    /// Name under which the weights of this configuration are stored
    pub fn model_name(&self) -> ModelName {
        ModelName {
            date: self.weights_date,
            ticker: self.ticker.clone(),
            loss: self.loss,
            optimizer: self.optimizer.clone(),
            cell: self.cell,
            n_steps: self.n_steps,
            lookup_step: self.lookup_step,
            layers: self.n_layers,
            units: self.units,
            bidirectional: self.bidirectional,
        }
    }

    /// `<results_dir>/<model name>.json`
    pub fn weights_path(&self) -> PathBuf {
        self.model_name().weights_path(&self.results_dir)
    }

    /// `<data_dir>/<ticker>_<date>.csv`
    pub fn price_cache_path(&self, date: NaiveDate) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}.csv", self.ticker, date.format("%Y-%m-%d")))
    }
}

fn invalid(message: &str) -> RnnError {
    RnnError::InvalidParameter(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.feature_columns.len(), 11);
        assert_eq!(config.network_config().input_size, 11);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"ticker": "AAPL", "n_steps": 50, "cell": "GRU"}}"#).unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.ticker, "AAPL");
        assert_eq!(config.n_steps, 50);
        assert_eq!(config.cell, CellType::Gru);
        assert_eq!(config.units, 256);
        assert_eq!(config.loss, LossKind::Huber);
    }

    #[test]
    fn json_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let mut config = PipelineConfig::default();
        config.weights_date = NaiveDate::from_ymd_opt(2024, 3, 1);
        config.to_json_file(file.path()).unwrap();

        let loaded = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn rejects_bad_parameters() {
        let mut config = PipelineConfig::default();
        config.test_size = 1.0;
        assert!(matches!(config.validate(), Err(RnnError::InvalidParameter(_))));

        let mut config = PipelineConfig::default();
        config.feature_columns.push("volume".to_string());
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.feature_columns.retain(|c| c != "adjclose");
        assert!(config.validate().is_err());
        config.scale = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn cache_path_uses_ticker_and_date() {
        let config = PipelineConfig::default();
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(
            config.price_cache_path(date),
            PathBuf::from("data").join("XLK_2024-01-05.csv")
        );
    }
}
