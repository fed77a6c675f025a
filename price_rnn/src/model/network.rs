//! Stacked recurrent network with a linear head

use super::cells::{Dense, RecurrentCell, RecurrentLayer};
use super::{NetworkConfig, SequenceModel};
use crate::error::{Result, RnnError};
use ndarray::{Array1, ArrayView2, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Recurrent layers, each followed by dropout, then `Dense(1)`.
///
/// Every layer but the last passes its full output sequence to the next one.
/// Dropout is the identity at inference, so only its rate is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrentNetwork {
    config: NetworkConfig,
    layers: Vec<RecurrentLayer>,
    output: Dense,
}

impl RecurrentNetwork {
    /// Randomly initialized network, identical for the same seed
    pub fn new(config: NetworkConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let directions = if config.bidirectional { 2 } else { 1 };

        let mut layers = Vec::with_capacity(config.layers);
        let mut input_size = config.input_size;
        for _ in 0..config.layers {
            let forward = RecurrentCell::random(config.cell, input_size, config.units, &mut rng);
            let backward = config
                .bidirectional
                .then(|| RecurrentCell::random(config.cell, input_size, config.units, &mut rng));
            layers.push(RecurrentLayer { forward, backward });
            input_size = config.units * directions;
        }
        let output = Dense::random(input_size, &mut rng);

        Ok(Self {
            config,
            layers,
            output,
        })
    }

    /// Assemble a network from trained weights
    pub fn from_parts(
        config: NetworkConfig,
        layers: Vec<RecurrentLayer>,
        output: Dense,
    ) -> Result<Self> {
        let network = Self {
            config,
            layers,
            output,
        };
        network.validate()?;
        Ok(network)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn layers(&self) -> &[RecurrentLayer] {
        &self.layers
    }

    /// Check that the weights agree with the stored config and with each other
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;
        if self.layers.len() != self.config.layers {
            return Err(RnnError::ModelError(format!(
                "config declares {} layers but weights hold {}",
                self.config.layers,
                self.layers.len()
            )));
        }

        let mut input_size = self.config.input_size;
        for (index, layer) in self.layers.iter().enumerate() {
            layer.validate()?;
            let cell = layer.forward.cell_type();
            if cell != self.config.cell
                || layer.forward.units() != self.config.units
                || layer.is_bidirectional() != self.config.bidirectional
            {
                return Err(RnnError::ModelError(format!(
                    "layer {} is not a {}{} layer with {} units",
                    index,
                    if self.config.bidirectional { "bidirectional " } else { "" },
                    self.config.cell,
                    self.config.units
                )));
            }
            if layer.input_size() != input_size {
                return Err(RnnError::ModelError(format!(
                    "layer {} expects {} inputs but receives {}",
                    index,
                    layer.input_size(),
                    input_size
                )));
            }
            input_size = layer.output_size();
        }

        if self.output.input_size() != input_size {
            return Err(RnnError::ModelError(format!(
                "output layer expects {} inputs but receives {}",
                self.output.input_size(),
                input_size
            )));
        }
        Ok(())
    }

    /// Write the network as JSON, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        log::info!("saved {} network to {}", self.config.cell, path.display());
        Ok(())
    }

    /// Read a network written by [`save`](Self::save)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            RnnError::ModelError(format!("cannot open weights {}: {}", path.display(), e))
        })?;
        let network: Self = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            RnnError::ModelError(format!("cannot read weights {}: {}", path.display(), e))
        })?;
        network.validate()?;

        log::info!(
            "loaded {}-layer {} network from {}",
            network.layers.len(),
            network.config.cell,
            path.display()
        );
        Ok(network)
    }

    /// Load and reject weights whose layer structure differs from `expected`
    pub fn load_matching<P: AsRef<Path>>(path: P, expected: &NetworkConfig) -> Result<Self> {
        let network = Self::load(path)?;
        if !network.config.same_shape(expected) {
            return Err(RnnError::ModelError(format!(
                "weights were trained for {:?}, expected {:?}",
                network.config, expected
            )));
        }
        Ok(network)
    }

    fn forward(&self, window: ArrayView2<f64>) -> Result<f64> {
        let last = self.layers.len().saturating_sub(1);
        let mut activations = window.to_owned();
        for (index, layer) in self.layers.iter().enumerate() {
            activations = layer.run(activations.view(), index < last)?;
        }
        Ok(self.output.forward(activations.row(0)))
    }
}

impl SequenceModel for RecurrentNetwork {
    fn predict(&self, windows: ArrayView3<f64>) -> Result<Array1<f64>> {
        let features = windows.len_of(Axis(2));
        if features != self.config.input_size {
            return Err(RnnError::ModelError(format!(
                "windows have {} features, network expects {}",
                features, self.config.input_size
            )));
        }

        windows
            .outer_iter()
            .map(|window| self.forward(window))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from_vec)
    }

    fn name(&self) -> &str {
        self.config.cell.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellType;
    use approx::assert_relative_eq;
    use ndarray::Array3;
    use rstest::rstest;
    use tempfile::tempdir;

    fn config(cell: CellType, bidirectional: bool) -> NetworkConfig {
        NetworkConfig {
            cell,
            input_size: 3,
            units: 4,
            layers: 2,
            dropout: 0.4,
            bidirectional,
        }
    }

    fn windows() -> Array3<f64> {
        Array3::from_shape_fn((5, 6, 3), |(i, t, f)| ((i + 2 * t + f) % 7) as f64 / 7.0)
    }

    #[rstest]
    #[case(CellType::Lstm, false)]
    #[case(CellType::Gru, false)]
    #[case(CellType::Lstm, true)]
    #[case(CellType::Gru, true)]
    fn save_and_load_keep_predictions(#[case] cell: CellType, #[case] bidirectional: bool) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results").join("model.json");
        let network = RecurrentNetwork::new(config(cell, bidirectional), 9).unwrap();
        network.save(&path).unwrap();

        let loaded = RecurrentNetwork::load_matching(&path, &config(cell, bidirectional)).unwrap();
        let x = windows();
        let expected = network.predict(x.view()).unwrap();
        let actual = loaded.predict(x.view()).unwrap();
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *e, epsilon = 1e-12);
        }
    }

    #[test]
    fn predictions_are_finite_and_one_per_window() {
        let network = RecurrentNetwork::new(config(CellType::Lstm, false), 1).unwrap();
        let predictions = network.predict(windows().view()).unwrap();
        assert_eq!(predictions.len(), 5);
        assert!(predictions.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn same_seed_same_weights() {
        let a = RecurrentNetwork::new(config(CellType::Gru, true), 3).unwrap();
        let b = RecurrentNetwork::new(config(CellType::Gru, true), 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn wrong_feature_count_is_rejected() {
        let network = RecurrentNetwork::new(config(CellType::Lstm, false), 1).unwrap();
        let x = Array3::<f64>::zeros((1, 6, 4));
        assert!(matches!(network.predict(x.view()), Err(RnnError::ModelError(_))));
    }

    #[test]
    fn missing_weights_file_is_a_model_error() {
        let dir = tempdir().unwrap();
        let err = RecurrentNetwork::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, RnnError::ModelError(_)));
    }

    #[test]
    fn corrupt_weights_file_is_a_model_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{\"config\": 1}").unwrap();
        assert!(matches!(RecurrentNetwork::load(&path), Err(RnnError::ModelError(_))));
    }

    #[test]
    fn mismatched_config_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        RecurrentNetwork::new(config(CellType::Lstm, false), 1)
            .unwrap()
            .save(&path)
            .unwrap();

        let err = RecurrentNetwork::load_matching(&path, &config(CellType::Gru, false)).unwrap_err();
        assert!(matches!(err, RnnError::ModelError(_)));
    }

    #[test]
    fn inconsistent_parts_are_rejected() {
        let network = RecurrentNetwork::new(config(CellType::Lstm, false), 1).unwrap();
        let mut layers = network.layers().to_vec();
        layers.pop();
        let result = RecurrentNetwork::from_parts(
            network.config().clone(),
            layers,
            network.output.clone(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn output_head_width_must_match_last_layer() {
        let network = RecurrentNetwork::new(config(CellType::Gru, true), 2).unwrap();
        let layers = network.layers().to_vec();
        // bidirectional layers emit 2 * units
        let head = Dense::new(Array1::from_elem(8, 0.25), 0.1);
        let rebuilt =
            RecurrentNetwork::from_parts(network.config().clone(), layers.clone(), head).unwrap();
        assert_eq!(rebuilt.predict(windows().view()).unwrap().len(), 5);

        let narrow = Dense::new(Array1::zeros(4), 0.0);
        assert!(matches!(
            RecurrentNetwork::from_parts(network.config().clone(), layers, narrow),
            Err(RnnError::ModelError(_))
        ));
    }
}
