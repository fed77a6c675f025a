//! Weight file naming

use super::CellType;
use crate::metrics::LossKind;
use chrono::NaiveDate;
use std::fmt;
use std::path::{Path, PathBuf};

/// Identifies a trained network by the settings it was trained with.
///
/// Displays as
/// `[YYYY-MM-DD_]{ticker}-{loss}-{optimizer}-{cell}-seq-{n_steps}-step-{lookup_step}-layers-{layers}-units-{units}[-b]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelName {
    pub date: Option<NaiveDate>,
    pub ticker: String,
    pub loss: LossKind,
    pub optimizer: String,
    pub cell: CellType,
    pub n_steps: usize,
    pub lookup_step: usize,
    pub layers: usize,
    pub units: usize,
    pub bidirectional: bool,
}

impl ModelName {
    /// `<dir>/<name>.json`
    pub fn weights_path<P: AsRef<Path>>(&self, dir: P) -> PathBuf {
        dir.as_ref().join(format!("{}.json", self))
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(date) = self.date {
            write!(f, "{}_", date.format("%Y-%m-%d"))?;
        }
        write!(
            f,
            "{}-{}-{}-{}-seq-{}-step-{}-layers-{}-units-{}",
            self.ticker,
            self.loss.name(),
            self.optimizer,
            self.cell.name(),
            self.n_steps,
            self.lookup_step,
            self.layers,
            self.units
        )?;
        if self.bidirectional {
            f.write_str("-b")?;
        }
        Ok(())
    }
}
