//! Sliding windows, labels and the train/test split

use crate::buffer::RollingBuffer;
use crate::error::{Result, RnnError};
use crate::features::{columns, FeatureFrame};
use ndarray::{Array1, Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Model inputs built from a feature frame
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedDataset {
    /// `[samples, n_steps, features]`
    pub windows: Array3<f64>,
    /// Value of `adjclose` `lookup_step` rows after each window's last row
    pub labels: Array1<f64>,
    /// `[n_steps, features]` window used to forecast past the end of the data
    pub future_window: Array2<f64>,
    /// Column order of the feature axis
    pub feature_columns: Vec<String>,
}

impl WindowedDataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_steps(&self) -> usize {
        self.windows.len_of(Axis(1))
    }

    pub fn n_features(&self) -> usize {
        self.windows.len_of(Axis(2))
    }
}

/// Windows and labels split into training and test parts
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit {
    pub x_train: Array3<f64>,
    pub x_test: Array3<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

impl DatasetSplit {
    pub fn train_len(&self) -> usize {
        self.y_train.len()
    }

    pub fn test_len(&self) -> usize {
        self.y_test.len()
    }
}

/// Build `(window, label)` examples and the future window.
///
/// The label of a window ending at row `i` is `adjclose[i + lookup_step]`. Rows
/// with a null in any frame column, and the last `lookup_step` rows (which have
/// no label), are skipped. The future window is taken from the last usable
/// window shifted by one row and extended with the final `lookup_step` rows of
/// the frame, so it always ends inside the observed data.
pub fn build_windows<S: AsRef<str>>(
    frame: &FeatureFrame,
    feature_columns: &[S],
    n_steps: usize,
    lookup_step: usize,
) -> Result<WindowedDataset> {
    if n_steps == 0 {
        return Err(RnnError::InvalidParameter(
            "n_steps must be at least 1".to_string(),
        ));
    }
    if lookup_step == 0 {
        return Err(RnnError::InvalidParameter(
            "lookup_step must be at least 1".to_string(),
        ));
    }
    if feature_columns.is_empty() {
        return Err(RnnError::InvalidParameter(
            "at least one feature column is required".to_string(),
        ));
    }
    frame.require_columns(feature_columns)?;
    frame.require_columns(&[columns::ADJCLOSE])?;

    let height = frame.height();
    let adjclose = frame.column_values(columns::ADJCLOSE)?;
    let future: Vec<Option<f64>> = (0..height)
        .map(|i| adjclose.get(i + lookup_step).copied().flatten())
        .collect();

    let features = feature_columns
        .iter()
        .map(|name| frame.column_values(name.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    let feature_row = |row: usize| -> Option<Vec<f64>> {
        features.iter().map(|column| column[row]).collect()
    };

    // captured before any row is dropped
    let tail_rows = (height.saturating_sub(lookup_step)..height)
        .map(|row| feature_row(row))
        .collect::<Option<Vec<_>>>();

    let mut complete = vec![true; height];
    for name in frame.column_names() {
        for (row, value) in frame.column_values(&name)?.iter().enumerate() {
            if value.is_none() {
                complete[row] = false;
            }
        }
    }

    let mut buffer = RollingBuffer::new(n_steps);
    let mut windows = Vec::new();
    let mut labels = Vec::new();
    let mut usable = 0usize;

    for row in 0..height {
        let (true, Some(label)) = (complete[row], future[row]) else {
            continue;
        };
        let Some(values) = feature_row(row) else {
            continue;
        };
        usable += 1;
        buffer.push(values);
        if buffer.is_full() {
            windows.extend(buffer.iter().flatten().copied());
            labels.push(label);
        }
    }

    if usable < n_steps {
        return Err(RnnError::InsufficientData(format!(
            "{} usable rows, at least {} required for windows of {} steps {} days ahead",
            usable,
            n_steps + lookup_step,
            n_steps,
            lookup_step
        )));
    }

    let tail_rows = tail_rows.ok_or_else(|| {
        RnnError::InsufficientData(format!(
            "the last {} rows have missing feature values",
            lookup_step
        ))
    })?;

    let n_features = feature_columns.len();
    let future_rows: Vec<f64> = buffer
        .iter()
        .chain(tail_rows.iter())
        .skip(1)
        .take(n_steps)
        .flatten()
        .copied()
        .collect();

    let samples = labels.len();
    log::debug!(
        "built {} windows of shape [{}, {}] from {} rows",
        samples,
        n_steps,
        n_features,
        height
    );

    Ok(WindowedDataset {
        windows: Array3::from_shape_vec((samples, n_steps, n_features), windows)?,
        labels: Array1::from_vec(labels),
        future_window: Array2::from_shape_vec((n_steps, n_features), future_rows)?,
        feature_columns: feature_columns
            .iter()
            .map(|name| name.as_ref().to_string())
            .collect(),
    })
}

/// Split into train and test parts.
///
/// The test part holds `ceil(test_size * n)` examples. Without shuffling it is the
/// tail of the dataset. Shuffling permutes whole examples with a seeded RNG.
pub fn train_test_split(
    dataset: &WindowedDataset,
    test_size: f64,
    shuffle: bool,
    seed: u64,
) -> Result<DatasetSplit> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(RnnError::InvalidParameter(format!(
            "test_size must be between 0 and 1 (exclusive), got {}",
            test_size
        )));
    }

    let n = dataset.len();
    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(RnnError::InsufficientData(format!(
            "{} examples cannot be split with test_size {}",
            n, test_size
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    if shuffle {
        let mut rng = StdRng::seed_from_u64(seed);
        order.shuffle(&mut rng);
    }
    let (train, test) = order.split_at(n_train);

    Ok(DatasetSplit {
        x_train: dataset.windows.select(Axis(0), train),
        x_test: dataset.windows.select(Axis(0), test),
        y_train: dataset.labels.select(Axis(0), train),
        y_test: dataset.labels.select(Axis(0), test),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaling::scale_features;
    use crate::utils::{generate_price_series, linear_price_series};
    use approx::assert_relative_eq;
    use ndarray::s;
    use rstest::rstest;

    const COLUMNS: [&str; 2] = ["adjclose", "volume"];

    fn raw_frame(days: usize) -> FeatureFrame {
        FeatureFrame::from_prices(&linear_price_series("XLK", days, 10.0, 1.0)).unwrap()
    }

    #[rstest]
    #[case(30, 5, 1)]
    #[case(30, 5, 3)]
    #[case(12, 10, 2)]
    fn example_count_without_drops(#[case] len: usize, #[case] n: usize, #[case] l: usize) {
        let dataset = build_windows(&raw_frame(len), &COLUMNS, n, l).unwrap();
        assert_eq!(dataset.len(), len - n - l + 1);
        assert_eq!(dataset.windows.dim(), (len - n - l + 1, n, 2));
    }

    #[test]
    fn label_is_adjclose_lookup_step_ahead() {
        let dataset = build_windows(&raw_frame(20), &COLUMNS, 4, 3).unwrap();
        for (i, label) in dataset.labels.iter().enumerate() {
            let last_close = dataset.windows[[i, 3, 0]];
            assert_relative_eq!(*label - last_close, 3.0);
        }
    }

    #[test]
    fn exact_length_gives_one_scaled_example() {
        let (n, l) = (6, 2);
        let mut frame = raw_frame(n + l);
        scale_features(&mut frame, &COLUMNS).unwrap();

        let dataset = build_windows(&frame, &COLUMNS, n, l).unwrap();
        let adjclose = frame.dense_column("adjclose").unwrap();
        assert_eq!(dataset.len(), 1);
        assert_relative_eq!(dataset.labels[0], adjclose[n + l - 1]);
        assert_relative_eq!(dataset.labels[0], 1.0);
    }

    #[test]
    fn too_few_rows_is_an_error() {
        let err = build_windows(&raw_frame(7), &COLUMNS, 6, 2).unwrap_err();
        assert!(matches!(err, RnnError::InsufficientData(_)));
    }

    #[test]
    fn zero_window_is_rejected() {
        assert!(matches!(
            build_windows(&raw_frame(10), &COLUMNS, 0, 1),
            Err(RnnError::InvalidParameter(_))
        ));
    }

    #[test]
    fn missing_column_is_reported() {
        let err = build_windows(&raw_frame(10), &["adjclose", "RSI"], 3, 1).unwrap_err();
        assert!(matches!(err, RnnError::MissingColumn(ref c) if c == "RSI"));
    }

    #[test]
    fn warmup_rows_are_dropped() {
        let series = generate_price_series("XLK", 60, 100.0, 11);
        let frame = FeatureFrame::with_indicators(&series).unwrap();
        let dataset = build_windows(&frame, &COLUMNS, 10, 1).unwrap();
        // 19 rows before the 20-day band fills, 1 row without a label
        assert_eq!(dataset.len(), 60 - 19 - 1 - 10 + 1);
    }

    #[test]
    fn future_window_with_one_step_is_the_tail() {
        let frame = raw_frame(25);
        let dataset = build_windows(&frame, &COLUMNS, 5, 1).unwrap();
        let adjclose = frame.dense_column("adjclose").unwrap();
        let expected: Vec<f64> = adjclose[20..].to_vec();
        assert_eq!(dataset.future_window.column(0).to_vec(), expected);
    }

    #[test]
    fn future_window_with_longer_step_ends_in_the_data() {
        let frame = raw_frame(25);
        let dataset = build_windows(&frame, &COLUMNS, 5, 3).unwrap();
        assert_eq!(dataset.future_window.dim(), (5, 2));
        // last window covers rows 17..=21, shifted by one row
        let closes = dataset.future_window.column(0).to_vec();
        assert_eq!(closes, vec![28.0, 29.0, 30.0, 31.0, 32.0]);
    }

    #[test]
    fn split_keeps_tail_for_testing() {
        let dataset = build_windows(&raw_frame(30), &COLUMNS, 5, 1).unwrap();
        let split = train_test_split(&dataset, 0.2, false, 0).unwrap();
        assert_eq!(split.test_len(), 5);
        assert_eq!(split.train_len(), 20);
        assert_eq!(split.y_test, dataset.labels.slice(s![20..]).to_owned());
    }

    #[test]
    fn shuffled_split_keeps_pairs() {
        let dataset = build_windows(&raw_frame(50), &COLUMNS, 5, 2).unwrap();
        let split = train_test_split(&dataset, 0.25, true, 300).unwrap();
        assert_eq!(split.train_len() + split.test_len(), dataset.len());
        assert_ne!(split.y_test, dataset.labels.slice(s![dataset.len() - split.test_len()..]).to_owned());

        for (x, y) in [(&split.x_train, &split.y_train), (&split.x_test, &split.y_test)] {
            for (window, label) in x.outer_iter().zip(y.iter()) {
                assert_relative_eq!(label - window[[4, 0]], 2.0);
            }
        }
    }

    #[test]
    fn split_needs_both_parts() {
        let dataset = build_windows(&raw_frame(6), &COLUMNS, 5, 1).unwrap();
        assert!(matches!(
            train_test_split(&dataset, 0.2, false, 0),
            Err(RnnError::InsufficientData(_))
        ));
    }
}
