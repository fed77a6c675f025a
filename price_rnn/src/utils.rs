//! Synthetic price series for tests and offline runs

use crate::data::{PriceBar, PriceSeries};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default()
}

/// Generate a random-walk daily series that is identical for the same seed.
///
/// At least one bar is always produced.
pub fn generate_price_series(
    ticker: &str,
    days: usize,
    starting_price: f64,
    seed: u64,
) -> PriceSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let volatility = 0.02;
    let mut current_price = starting_price;

    let bars = (0..days.max(1))
        .map(|i| {
            let price_change = current_price * volatility * (rng.gen::<f64>() - 0.5);
            let open = current_price;
            // keep prices positive on long walks
            let close = (open + price_change).max(0.01);
            let high = open.max(close) + rng.gen::<f64>() * volatility * open * 0.5;
            let low = (open.min(close) - rng.gen::<f64>() * volatility * open * 0.5).max(0.005);
            let volume = rng.gen_range(1_000..10_000) as f64;
            current_price = close;

            PriceBar {
                date: base_date() + Duration::days(i as i64),
                open,
                high,
                low,
                close,
                adjclose: close * 0.98,
                volume,
            }
        })
        .collect();

    PriceSeries::from_ordered(ticker, bars)
}

/// A series whose adjusted close moves by `step` each day
pub fn linear_price_series(ticker: &str, days: usize, starting_price: f64, step: f64) -> PriceSeries {
    let bars = (0..days.max(1))
        .map(|i| {
            let price = starting_price + step * i as f64;
            PriceBar {
                date: base_date() + Duration::days(i as i64),
                open: price,
                high: price + 0.5,
                low: price - 0.5,
                close: price,
                adjclose: price,
                volume: 1_000.0 + i as f64,
            }
        })
        .collect();

    PriceSeries::from_ordered(ticker, bars)
}
