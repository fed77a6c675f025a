//! Recurrent sequence models
//!
//! A model maps a batch of feature windows `[batch, steps, features]` to one
//! scaled prediction per window. Only inference is implemented; weights are
//! produced by a separate training run and loaded from disk.

use crate::error::{Result, RnnError};
use crate::metrics::{mean_absolute_error, LossKind};
use ndarray::{Array1, ArrayView1, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};
use std::str::FromStr;

pub mod cells;
pub mod naming;
pub mod network;

pub use cells::{Dense, GruCell, LstmCell, RecurrentCell, RecurrentLayer};
pub use naming::ModelName;
pub use network::RecurrentNetwork;

/// Kind of recurrent cell in every layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    #[serde(rename = "LSTM")]
    Lstm,
    #[serde(rename = "GRU")]
    Gru,
}

impl CellType {
    pub fn name(&self) -> &'static str {
        match self {
            CellType::Lstm => "LSTM",
            CellType::Gru => "GRU",
        }
    }
}

impl Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CellType {
    type Err = RnnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LSTM" => Ok(CellType::Lstm),
            "GRU" => Ok(CellType::Gru),
            _ => Err(RnnError::InvalidParameter(format!(
                "unknown cell type '{}'",
                s
            ))),
        }
    }
}

/// Shape of a stacked recurrent network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub cell: CellType,
    /// Features per time step
    pub input_size: usize,
    pub units: usize,
    pub layers: usize,
    /// Applied after each recurrent layer during training only
    pub dropout: f64,
    pub bidirectional: bool,
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 || self.units == 0 || self.layers == 0 {
            return Err(RnnError::InvalidParameter(format!(
                "network needs at least one input, unit and layer, got {}/{}/{}",
                self.input_size, self.units, self.layers
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(RnnError::InvalidParameter(
                "dropout must be in [0, 1)".to_string(),
            ));
        }
        Ok(())
    }

    /// Same layer structure, ignoring training-only settings
    pub fn same_shape(&self, other: &NetworkConfig) -> bool {
        self.cell == other.cell
            && self.input_size == other.input_size
            && self.units == other.units
            && self.layers == other.layers
            && self.bidirectional == other.bidirectional
    }
}

/// Anything that turns feature windows into scaled predictions
pub trait SequenceModel: Debug {
    /// One prediction per window of `[batch, steps, features]`
    fn predict(&self, windows: ArrayView3<f64>) -> Result<Array1<f64>>;

    /// Prediction for a single `[steps, features]` window
    fn predict_one(&self, window: ArrayView2<f64>) -> Result<f64> {
        let batch = window.insert_axis(Axis(0));
        let prediction = self.predict(batch)?;
        prediction
            .get(0)
            .copied()
            .ok_or_else(|| RnnError::ModelError("model returned no prediction".to_string()))
    }

    fn name(&self) -> &str;
}

/// Loss and mean absolute error on a labelled set, both in scaled units
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub loss: f64,
    pub mae: f64,
    pub predictions: Array1<f64>,
}

/// Predict `x` in batches and score the predictions against `y`
pub fn evaluate<M: SequenceModel + ?Sized>(
    model: &M,
    x: ArrayView3<f64>,
    y: ArrayView1<f64>,
    loss: LossKind,
    batch_size: usize,
) -> Result<Evaluation> {
    if batch_size == 0 {
        return Err(RnnError::InvalidParameter(
            "batch_size must be at least 1".to_string(),
        ));
    }
    if x.len_of(Axis(0)) != y.len() {
        return Err(RnnError::DataError(format!(
            "{} windows but {} labels",
            x.len_of(Axis(0)),
            y.len()
        )));
    }

    let mut predictions = Vec::with_capacity(y.len());
    for batch in x.axis_chunks_iter(Axis(0), batch_size) {
        predictions.extend(model.predict(batch)?.iter().copied());
    }

    let actual = y.to_vec();
    let evaluation = Evaluation {
        loss: loss.compute(&actual, &predictions)?,
        mae: mean_absolute_error(&actual, &predictions)?,
        predictions: Array1::from_vec(predictions),
    };
    log::debug!(
        "{} on {} windows: {} {:.6}, mae {:.6}",
        model.name(),
        actual.len(),
        loss.name(),
        evaluation.loss,
        evaluation.mae
    );
    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, Array3};

    /// Predicts the first feature of each window's last step
    #[derive(Debug)]
    struct LastValue;

    impl SequenceModel for LastValue {
        fn predict(&self, windows: ArrayView3<f64>) -> Result<Array1<f64>> {
            let steps = windows.len_of(Axis(1));
            Ok(windows.index_axis(Axis(1), steps - 1).column(0).to_owned())
        }

        fn name(&self) -> &str {
            "last-value"
        }
    }

    #[test]
    fn cell_type_parses_case_insensitively() {
        assert_eq!("lstm".parse::<CellType>().unwrap(), CellType::Lstm);
        assert_eq!("GRU".parse::<CellType>().unwrap(), CellType::Gru);
        assert!("rnn".parse::<CellType>().is_err());
        assert_eq!(CellType::Gru.to_string(), "GRU");
    }

    #[test]
    fn evaluate_batches_cover_every_window() {
        let x = Array3::from_shape_fn((5, 3, 2), |(i, t, f)| (i * 10 + t + f) as f64);
        let y = arr1(&[2.0, 12.0, 22.0, 32.0, 40.0]);

        let evaluation = evaluate(&LastValue, x.view(), y.view(), LossKind::MeanAbsoluteError, 2)
            .unwrap();
        assert_eq!(evaluation.predictions.to_vec(), vec![2.0, 12.0, 22.0, 32.0, 42.0]);
        assert_relative_eq!(evaluation.mae, 0.4);
        assert_relative_eq!(evaluation.loss, 0.4);
    }

    #[test]
    fn evaluate_checks_label_count() {
        let x = Array3::<f64>::zeros((2, 3, 1));
        let y = arr1(&[1.0]);
        assert!(evaluate(&LastValue, x.view(), y.view(), LossKind::Huber, 8).is_err());
    }

    #[test]
    fn predict_one_uses_a_batch_of_one() {
        let window = ndarray::arr2(&[[1.0, 0.0], [7.0, 0.0]]);
        assert_eq!(LastValue.predict_one(window.view()).unwrap(), 7.0);
    }

    #[test]
    fn shape_comparison_ignores_dropout() {
        let a = NetworkConfig {
            cell: CellType::Lstm,
            input_size: 11,
            units: 256,
            layers: 3,
            dropout: 0.4,
            bidirectional: false,
        };
        let b = NetworkConfig { dropout: 0.2, ..a.clone() };
        let c = NetworkConfig { bidirectional: true, ..a.clone() };
        assert!(a.same_shape(&b));
        assert!(!a.same_shape(&c));
    }
}
