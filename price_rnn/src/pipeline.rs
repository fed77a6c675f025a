//! End-to-end evaluation run
//!
//! Fetch prices, derive features, scale, window, split, load the network,
//! then report the error in price units, one forecast past the data and the
//! directional accuracy on the test set.

use crate::config::PipelineConfig;
use crate::data::{CsvPriceCache, MarketDataProvider, PriceSeries};
use crate::error::Result;
use crate::features::{columns, FeatureFrame};
use crate::metrics::{directional_accuracy, ComparisonSeries};
use crate::model::{evaluate, RecurrentNetwork, SequenceModel};
use crate::scaling::{scale_features, ColumnScalers, MinMaxScaler};
use crate::windowing::{build_windows, train_test_split, DatasetSplit, WindowedDataset};
use chrono::Local;
use std::fmt;
use std::path::PathBuf;

/// Everything derived from a price series before the model is involved
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Feature frame after scaling
    pub frame: FeatureFrame,
    /// Empty when scaling is disabled
    pub scalers: ColumnScalers,
    pub dataset: WindowedDataset,
    pub split: DatasetSplit,
}

/// Outcome of one run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub ticker: String,
    pub model_name: String,
    pub weights_path: Option<PathBuf>,
    pub train_size: usize,
    pub test_size: usize,
    pub lookup_step: usize,
    /// Loss on the test set, scaled units
    pub loss: f64,
    /// Mean absolute error on the test set, scaled units
    pub mae_scaled: f64,
    /// Mean absolute error on the test set, price units
    pub mean_absolute_error: f64,
    /// Adjusted close forecast `lookup_step` days past the data
    pub future_price: f64,
    pub accuracy: f64,
    pub comparison: ComparisonSeries,
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mean Absolute Error: {}", self.mean_absolute_error)?;
        writeln!(
            f,
            "Future price after {} days is {:.2}$",
            self.lookup_step, self.future_price
        )?;
        write!(f, "{}: Accuracy Score: {}", self.lookup_step, self.accuracy)
    }
}

/// Maps scaled model outputs back to prices
#[derive(Debug, Clone, Copy)]
struct PriceScale(Option<MinMaxScaler>);

impl PriceScale {
    fn price(&self, value: f64) -> f64 {
        self.0.map_or(value, |s| s.inverse_transform(value))
    }

    fn error(&self, value: f64) -> f64 {
        self.0.map_or(value, |s| s.scale_error(value))
    }
}

/// Runs the evaluation described by a [`PipelineConfig`]
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Derive features, scale, window and split.
    ///
    /// Missing feature columns are reported before anything is scaled.
    pub fn prepare(&self, series: &PriceSeries) -> Result<PreparedData> {
        let config = &self.config;
        let mut frame = FeatureFrame::with_indicators(series)?;
        frame.require_columns(config.feature_columns.as_slice())?;

        let scalers = if config.scale {
            scale_features(&mut frame, config.feature_columns.as_slice())?
        } else {
            ColumnScalers::new()
        };

        let dataset = build_windows(
            &frame,
            config.feature_columns.as_slice(),
            config.n_steps,
            config.lookup_step,
        )?;
        let split = train_test_split(&dataset, config.test_size, config.shuffle, config.seed)?;

        log::info!(
            "{}: {} rows, {} windows ({} train / {} test)",
            series.ticker(),
            frame.height(),
            dataset.len(),
            split.train_len(),
            split.test_len()
        );

        Ok(PreparedData {
            frame,
            scalers,
            dataset,
            split,
        })
    }

    /// Fetch prices from `provider`, load the configured weights and evaluate
    pub fn run<P: MarketDataProvider + ?Sized>(&self, provider: &P) -> Result<PipelineReport> {
        let config = &self.config;
        let series = provider.fetch_daily(&config.ticker)?;
        log::info!(
            "fetched {} daily bars for {}",
            series.len(),
            series.ticker()
        );

        if config.cache_prices {
            let today = Local::now().date_naive();
            CsvPriceCache::new(config.price_cache_path(today)).save(&series)?;
        }

        let prepared = self.prepare(&series)?;

        let weights_path = config.weights_path();
        log::info!("loading weights from {}", weights_path.display());
        let network = RecurrentNetwork::load_matching(&weights_path, &config.network_config())?;

        let mut report = self.run_with_model(&prepared, &network)?;
        report.weights_path = Some(weights_path);
        Ok(report)
    }

    /// Evaluate an already loaded model on prepared data
    pub fn run_with_model<M: SequenceModel + ?Sized>(
        &self,
        prepared: &PreparedData,
        model: &M,
    ) -> Result<PipelineReport> {
        let config = &self.config;
        let split = &prepared.split;
        let scale = PriceScale(if config.scale {
            Some(*prepared.scalers.require(columns::ADJCLOSE)?)
        } else {
            None
        });

        let evaluation = evaluate(
            model,
            split.x_test.view(),
            split.y_test.view(),
            config.loss,
            config.batch_size,
        )?;
        let mean_absolute_error = scale.error(evaluation.mae);

        let future_scaled = model.predict_one(prepared.dataset.future_window.view())?;
        let future_price = scale.price(future_scaled);

        let actual: Vec<f64> = split.y_test.iter().map(|&v| scale.price(v)).collect();
        let predicted: Vec<f64> = evaluation
            .predictions
            .iter()
            .map(|&v| scale.price(v))
            .collect();
        let accuracy = directional_accuracy(&actual, &predicted, config.lookup_step)?;

        let comparison = ComparisonSeries::tail(&actual, &predicted, config.comparison_points)?;
        if let Some(path) = &config.comparison_csv {
            comparison.write_csv(path)?;
            log::info!("wrote actual/predicted comparison to {}", path.display());
        }

        log::info!(
            "{}: mae {:.4}, future price {:.2}, accuracy {:.4}",
            model.name(),
            mean_absolute_error,
            future_price,
            accuracy
        );

        Ok(PipelineReport {
            ticker: config.ticker.clone(),
            model_name: config.model_name().to_string(),
            weights_path: None,
            train_size: split.train_len(),
            test_size: split.test_len(),
            lookup_step: config.lookup_step,
            loss: evaluation.loss,
            mae_scaled: evaluation.mae,
            mean_absolute_error,
            future_price,
            accuracy,
            comparison,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RnnError;
    use crate::utils::generate_price_series;
    use approx::assert_relative_eq;
    use ndarray::{Array1, ArrayView3, Axis};

    /// Predicts the scaled adjclose of each window's last row
    #[derive(Debug)]
    struct Persistence;

    impl SequenceModel for Persistence {
        fn predict(&self, windows: ArrayView3<f64>) -> Result<Array1<f64>> {
            let last = windows.len_of(Axis(1)) - 1;
            Ok(windows.index_axis(Axis(1), last).column(0).to_owned())
        }

        fn name(&self) -> &str {
            "persistence"
        }
    }

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            n_steps: 10,
            units: 4,
            n_layers: 1,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn prepare_scales_and_splits() {
        let pipeline = Pipeline::new(small_config()).unwrap();
        let series = generate_price_series("XLK", 120, 100.0, 5);
        let prepared = pipeline.prepare(&series).unwrap();

        assert_eq!(prepared.scalers.len(), 11);
        assert_eq!(prepared.dataset.n_features(), 11);
        // 19 warmup rows and 1 unlabeled row are dropped
        assert_eq!(prepared.dataset.len(), 120 - 20 - 10 + 1);
        assert_eq!(
            prepared.split.train_len() + prepared.split.test_len(),
            prepared.dataset.len()
        );
        assert!(prepared.dataset.windows.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn report_is_in_price_units() {
        let pipeline = Pipeline::new(small_config()).unwrap();
        let series = generate_price_series("XLK", 150, 100.0, 8);
        let prepared = pipeline.prepare(&series).unwrap();
        let report = pipeline.run_with_model(&prepared, &Persistence).unwrap();

        let scaler = prepared.scalers.require("adjclose").unwrap();
        assert_relative_eq!(report.mean_absolute_error, report.mae_scaled * (scaler.max() - scaler.min()));

        // persistence forecasts the last observed adjusted close
        let last_close = *series.adjclose().last().unwrap();
        assert_relative_eq!(report.future_price, last_close, epsilon = 1e-9);

        assert_eq!(report.comparison.len(), report.test_size);
        assert!((0.0..=1.0).contains(&report.accuracy));
        assert_eq!(report.weights_path, None);
    }

    #[test]
    fn unscaled_run_reports_raw_values() {
        let config = PipelineConfig {
            scale: false,
            ..small_config()
        };
        let pipeline = Pipeline::new(config).unwrap();
        let series = generate_price_series("XLK", 100, 50.0, 2);
        let prepared = pipeline.prepare(&series).unwrap();
        assert!(prepared.scalers.is_empty());

        let report = pipeline.run_with_model(&prepared, &Persistence).unwrap();
        assert_relative_eq!(report.mean_absolute_error, report.mae_scaled);
    }

    #[test]
    fn missing_feature_column_fails_before_windowing() {
        let mut config = small_config();
        config.feature_columns.push("RSI".to_string());
        let pipeline = Pipeline::new(config).unwrap();
        let series = generate_price_series("XLK", 100, 50.0, 2);

        let err = pipeline.prepare(&series).unwrap_err();
        assert_eq!(err.to_string(), "'RSI' does not exist in the dataframe.");
    }

    #[test]
    fn short_history_is_insufficient() {
        let pipeline = Pipeline::new(small_config()).unwrap();
        let series = generate_price_series("XLK", 25, 50.0, 2);
        assert!(matches!(
            pipeline.prepare(&series),
            Err(RnnError::InsufficientData(_))
        ));
    }

    #[test]
    fn report_prints_three_lines() {
        let report = PipelineReport {
            ticker: "XLK".to_string(),
            model_name: "m".to_string(),
            weights_path: None,
            train_size: 8,
            test_size: 2,
            lookup_step: 1,
            loss: 0.01,
            mae_scaled: 0.02,
            mean_absolute_error: 1.5,
            future_price: 142.456,
            accuracy: 0.5,
            comparison: ComparisonSeries::default(),
        };
        assert_eq!(
            report.to_string(),
            "Mean Absolute Error: 1.5\nFuture price after 1 days is 142.46$\n1: Accuracy Score: 0.5"
        );
    }
}
