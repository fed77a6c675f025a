//! # Price RNN workspace
//!
//! Umbrella crate for the workspace:
//!
//! - [`price_math`]: streaming and column-wise indicators (EMA, SMA, rolling
//!   standard deviation, Bollinger Bands)
//! - [`price_rnn`]: feature engineering, windowing and evaluation of pretrained
//!   recurrent price models
//!
//! ```
//! use price_rnn_workspace::price_math::series::ewm_mean;
//!
//! let ema = ewm_mean(&[1.0, 1.0, 1.0], 12).unwrap();
//! assert_eq!(ema, vec![1.0, 1.0, 1.0]);
//! ```

pub use price_math;
pub use price_rnn;
