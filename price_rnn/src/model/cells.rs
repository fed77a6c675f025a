//! Recurrent cells, bidirectional layers and the dense output head
//!
//! Weights use the packed layout of Keras layers: one input kernel, one
//! recurrent kernel and one bias, each holding every gate side by side.
//! LSTM gates are ordered input, forget, candidate, output. GRU gates are
//! ordered update, reset, candidate, with separate input and recurrent biases.

use super::CellType;
use crate::error::{Result, RnnError};
use ndarray::{concatenate, s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn uniform_matrix(rows: usize, cols: usize, limit: f64, rng: &mut StdRng) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-limit..limit))
}

fn check_shape(what: &str, actual: &[usize], expected: &[usize]) -> Result<()> {
    if actual != expected {
        return Err(RnnError::ModelError(format!(
            "{} has shape {:?}, expected {:?}",
            what, actual, expected
        )));
    }
    Ok(())
}

/// Long short-term memory cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmCell {
    /// `[input, 4 * units]`
    kernel: Array2<f64>,
    /// `[units, 4 * units]`
    recurrent_kernel: Array2<f64>,
    /// `[4 * units]`
    bias: Array1<f64>,
}

impl LstmCell {
    pub fn new(
        kernel: Array2<f64>,
        recurrent_kernel: Array2<f64>,
        bias: Array1<f64>,
    ) -> Result<Self> {
        let cell = Self {
            kernel,
            recurrent_kernel,
            bias,
        };
        cell.validate()?;
        Ok(cell)
    }

    pub(crate) fn random(input_size: usize, units: usize, rng: &mut StdRng) -> Self {
        let limit = (1.0 / units as f64).sqrt();
        let mut bias = Array1::zeros(4 * units);
        // forget gate starts open
        bias.slice_mut(s![units..2 * units]).fill(1.0);

        Self {
            kernel: uniform_matrix(input_size, 4 * units, limit, rng),
            recurrent_kernel: uniform_matrix(units, 4 * units, limit, rng),
            bias,
        }
    }

    pub fn input_size(&self) -> usize {
        self.kernel.nrows()
    }

    pub fn units(&self) -> usize {
        self.recurrent_kernel.nrows()
    }

    fn validate(&self) -> Result<()> {
        let units = self.units();
        if units == 0 {
            return Err(RnnError::ModelError("LSTM cell has no units".to_string()));
        }
        check_shape("LSTM kernel", self.kernel.shape(), &[self.input_size(), 4 * units])?;
        check_shape("LSTM recurrent kernel", self.recurrent_kernel.shape(), &[units, 4 * units])?;
        check_shape("LSTM bias", self.bias.shape(), &[4 * units])
    }

    /// Hidden state after every step of `inputs` (`[steps, input]`)
    fn run(&self, inputs: ArrayView2<f64>) -> Array2<f64> {
        let units = self.units();
        let mut h = Array1::<f64>::zeros(units);
        let mut c = Array1::<f64>::zeros(units);
        let mut states = Array2::zeros((inputs.nrows(), units));

        for (t, x) in inputs.outer_iter().enumerate() {
            let z = x.dot(&self.kernel) + h.dot(&self.recurrent_kernel) + &self.bias;
            let i = z.slice(s![0..units]).mapv(sigmoid);
            let f = z.slice(s![units..2 * units]).mapv(sigmoid);
            let g = z.slice(s![2 * units..3 * units]).mapv(f64::tanh);
            let o = z.slice(s![3 * units..]).mapv(sigmoid);

            c = &f * &c + &i * &g;
            h = &o * &c.mapv(f64::tanh);
            states.row_mut(t).assign(&h);
        }

        states
    }
}

/// Gated recurrent unit with the reset gate applied after the recurrent product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GruCell {
    /// `[input, 3 * units]`
    kernel: Array2<f64>,
    /// `[units, 3 * units]`
    recurrent_kernel: Array2<f64>,
    /// `[2, 3 * units]`: input bias then recurrent bias
    bias: Array2<f64>,
}

impl GruCell {
    pub fn new(
        kernel: Array2<f64>,
        recurrent_kernel: Array2<f64>,
        bias: Array2<f64>,
    ) -> Result<Self> {
        let cell = Self {
            kernel,
            recurrent_kernel,
            bias,
        };
        cell.validate()?;
        Ok(cell)
    }

    pub(crate) fn random(input_size: usize, units: usize, rng: &mut StdRng) -> Self {
        let limit = (1.0 / units as f64).sqrt();
        Self {
            kernel: uniform_matrix(input_size, 3 * units, limit, rng),
            recurrent_kernel: uniform_matrix(units, 3 * units, limit, rng),
            bias: Array2::zeros((2, 3 * units)),
        }
    }

    pub fn input_size(&self) -> usize {
        self.kernel.nrows()
    }

    pub fn units(&self) -> usize {
        self.recurrent_kernel.nrows()
    }

    fn validate(&self) -> Result<()> {
        let units = self.units();
        if units == 0 {
            return Err(RnnError::ModelError("GRU cell has no units".to_string()));
        }
        check_shape("GRU kernel", self.kernel.shape(), &[self.input_size(), 3 * units])?;
        check_shape("GRU recurrent kernel", self.recurrent_kernel.shape(), &[units, 3 * units])?;
        check_shape("GRU bias", self.bias.shape(), &[2, 3 * units])
    }

    fn run(&self, inputs: ArrayView2<f64>) -> Array2<f64> {
        let units = self.units();
        let input_bias = self.bias.row(0);
        let recurrent_bias = self.bias.row(1);
        let mut h = Array1::<f64>::zeros(units);
        let mut states = Array2::zeros((inputs.nrows(), units));

        for (t, x) in inputs.outer_iter().enumerate() {
            let xw = x.dot(&self.kernel) + &input_bias;
            let hu = h.dot(&self.recurrent_kernel) + &recurrent_bias;

            let z = (&xw.slice(s![0..units]) + &hu.slice(s![0..units])).mapv(sigmoid);
            let r = (&xw.slice(s![units..2 * units]) + &hu.slice(s![units..2 * units]))
                .mapv(sigmoid);
            let candidate = (&xw.slice(s![2 * units..]) + &(&r * &hu.slice(s![2 * units..])))
                .mapv(f64::tanh);

            h = &z * &h + &(1.0 - &z) * &candidate;
            states.row_mut(t).assign(&h);
        }

        states
    }
}

/// One recurrent cell of either kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cell")]
pub enum RecurrentCell {
    #[serde(rename = "LSTM")]
    Lstm(LstmCell),
    #[serde(rename = "GRU")]
    Gru(GruCell),
}

impl RecurrentCell {
    pub(crate) fn random(cell: CellType, input_size: usize, units: usize, rng: &mut StdRng) -> Self {
        match cell {
            CellType::Lstm => RecurrentCell::Lstm(LstmCell::random(input_size, units, rng)),
            CellType::Gru => RecurrentCell::Gru(GruCell::random(input_size, units, rng)),
        }
    }

    pub fn cell_type(&self) -> CellType {
        match self {
            RecurrentCell::Lstm(_) => CellType::Lstm,
            RecurrentCell::Gru(_) => CellType::Gru,
        }
    }

    pub fn input_size(&self) -> usize {
        match self {
            RecurrentCell::Lstm(cell) => cell.input_size(),
            RecurrentCell::Gru(cell) => cell.input_size(),
        }
    }

    pub fn units(&self) -> usize {
        match self {
            RecurrentCell::Lstm(cell) => cell.units(),
            RecurrentCell::Gru(cell) => cell.units(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            RecurrentCell::Lstm(cell) => cell.validate(),
            RecurrentCell::Gru(cell) => cell.validate(),
        }
    }

    fn run(&self, inputs: ArrayView2<f64>) -> Array2<f64> {
        match self {
            RecurrentCell::Lstm(cell) => cell.run(inputs),
            RecurrentCell::Gru(cell) => cell.run(inputs),
        }
    }
}

/// A recurrent layer, optionally with a second cell reading the sequence backwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrentLayer {
    pub forward: RecurrentCell,
    #[serde(default)]
    pub backward: Option<RecurrentCell>,
}

impl RecurrentLayer {
    pub fn is_bidirectional(&self) -> bool {
        self.backward.is_some()
    }

    pub fn input_size(&self) -> usize {
        self.forward.input_size()
    }

    /// Width of each output row
    pub fn output_size(&self) -> usize {
        match &self.backward {
            Some(backward) => self.forward.units() + backward.units(),
            None => self.forward.units(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.forward.validate()?;
        if let Some(backward) = &self.backward {
            backward.validate()?;
            if backward.cell_type() != self.forward.cell_type()
                || backward.input_size() != self.forward.input_size()
            {
                return Err(RnnError::ModelError(
                    "backward cell does not match the forward cell".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Run over `[steps, input]`.
    ///
    /// With `return_sequences` the result has one row per step. Otherwise it is a
    /// single row holding the final states, where the backward final state is the
    /// one reached after reading the whole sequence in reverse.
    pub fn run(&self, inputs: ArrayView2<f64>, return_sequences: bool) -> Result<Array2<f64>> {
        let steps = inputs.nrows();
        if steps == 0 {
            return Err(RnnError::ModelError("empty input sequence".to_string()));
        }

        let forward = self.forward.run(inputs);
        let Some(backward_cell) = &self.backward else {
            return Ok(if return_sequences {
                forward
            } else {
                forward.slice(s![steps - 1.., ..]).to_owned()
            });
        };

        let backward = backward_cell.run(inputs.slice(s![..;-1, ..]));
        let combined = if return_sequences {
            concatenate(Axis(1), &[forward.view(), backward.slice(s![..;-1, ..])])?
        } else {
            concatenate(
                Axis(1),
                &[
                    forward.slice(s![steps - 1.., ..]),
                    backward.slice(s![steps - 1.., ..]),
                ],
            )?
        };
        Ok(combined)
    }
}

/// Linear output with a single unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    kernel: Array1<f64>,
    bias: f64,
}

impl Dense {
    pub fn new(kernel: Array1<f64>, bias: f64) -> Self {
        Self { kernel, bias }
    }

    pub(crate) fn random(input_size: usize, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (input_size as f64 + 1.0)).sqrt();
        Self {
            kernel: Array1::from_shape_fn(input_size, |_| rng.gen_range(-limit..limit)),
            bias: 0.0,
        }
    }

    pub fn input_size(&self) -> usize {
        self.kernel.len()
    }

    pub fn forward(&self, x: ArrayView1<f64>) -> f64 {
        x.dot(&self.kernel) + self.bias
    }
}
