//! Loss functions, regression metrics and directional accuracy

use crate::error::{Result, RnnError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Loss the model was compiled with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LossKind {
    /// Huber loss with a threshold of 1
    #[serde(rename = "huber_loss")]
    Huber,
    #[serde(rename = "mae", alias = "mean_absolute_error")]
    MeanAbsoluteError,
    #[serde(rename = "mse", alias = "mean_squared_error")]
    MeanSquaredError,
}

impl LossKind {
    /// Name used in model file names
    pub fn name(&self) -> &'static str {
        match self {
            LossKind::Huber => "huber_loss",
            LossKind::MeanAbsoluteError => "mae",
            LossKind::MeanSquaredError => "mse",
        }
    }

    pub fn compute(&self, actual: &[f64], predicted: &[f64]) -> Result<f64> {
        match self {
            LossKind::Huber => huber(actual, predicted, HUBER_DELTA),
            LossKind::MeanAbsoluteError => mean_absolute_error(actual, predicted),
            LossKind::MeanSquaredError => mean_squared_error(actual, predicted),
        }
    }
}

pub const HUBER_DELTA: f64 = 1.0;

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() {
        return Err(RnnError::InvalidParameter(format!(
            "{} actual values but {} predictions",
            actual.len(),
            predicted.len()
        )));
    }
    if actual.is_empty() {
        return Err(RnnError::InsufficientData(
            "no values to compare".to_string(),
        ));
    }
    Ok(())
}

fn mean_of<F>(actual: &[f64], predicted: &[f64], f: F) -> Result<f64>
where
    F: Fn(f64) -> f64,
{
    check_lengths(actual, predicted)?;
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| f(p - a))
        .sum();
    Ok(total / actual.len() as f64)
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    mean_of(actual, predicted, f64::abs)
}

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    mean_of(actual, predicted, |e| e * e)
}

pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    mean_squared_error(actual, predicted).map(f64::sqrt)
}

/// Quadratic below `delta`, linear above it
pub fn huber(actual: &[f64], predicted: &[f64], delta: f64) -> Result<f64> {
    if delta <= 0.0 {
        return Err(RnnError::InvalidParameter(
            "huber delta must be positive".to_string(),
        ));
    }
    mean_of(actual, predicted, |e| {
        let e = e.abs();
        if e <= delta {
            0.5 * e * e
        } else {
            delta * (e - 0.5 * delta)
        }
    })
}

/// Share of days where the predicted direction matches the actual one.
///
/// For each `i` in `0..len - lookup_step` the actual move is up when
/// `actual[i + lookup_step] > actual[i]`, and the predicted move is up when
/// `predicted[i + lookup_step] > actual[i]`. Both series must be in the same units.
pub fn directional_accuracy(actual: &[f64], predicted: &[f64], lookup_step: usize) -> Result<f64> {
    if actual.len() != predicted.len() {
        return Err(RnnError::InvalidParameter(format!(
            "{} actual values but {} predictions",
            actual.len(),
            predicted.len()
        )));
    }
    if lookup_step == 0 || actual.len() <= lookup_step {
        return Err(RnnError::InsufficientData(format!(
            "directional accuracy needs more than {} values, got {}",
            lookup_step,
            actual.len()
        )));
    }

    let pairs = actual.len() - lookup_step;
    let hits = (0..pairs)
        .filter(|&i| {
            let actual_up = actual[i + lookup_step] > actual[i];
            let predicted_up = predicted[i + lookup_step] > actual[i];
            actual_up == predicted_up
        })
        .count();

    Ok(hits as f64 / pairs as f64)
}

#[derive(Debug, Serialize)]
struct ComparisonRow {
    index: usize,
    actual: f64,
    predicted: f64,
}

/// Actual and predicted prices for the most recent test examples
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComparisonSeries {
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
}

impl ComparisonSeries {
    /// Keep the last `points` pairs
    pub fn tail(actual: &[f64], predicted: &[f64], points: usize) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(RnnError::InvalidParameter(format!(
                "{} actual values but {} predictions",
                actual.len(),
                predicted.len()
            )));
        }
        let start = actual.len().saturating_sub(points);
        Ok(Self {
            actual: actual[start..].to_vec(),
            predicted: predicted[start..].to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }

    /// Write `index,actual,predicted` rows
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::Writer::from_path(path)?;
        for (index, (&actual, &predicted)) in self.actual.iter().zip(&self.predicted).enumerate() {
            writer.serialize(ComparisonRow {
                index,
                actual,
                predicted,
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}
