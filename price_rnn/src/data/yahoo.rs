//! Yahoo Finance chart API client

use super::{MarketDataProvider, PriceBar, PriceSeries};
use crate::error::{Result, RnnError};
use chrono::{DateTime, NaiveDate};
use reqwest::blocking::Client;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

/// Blocking client for daily history from Yahoo Finance
#[derive(Debug, Clone)]
pub struct YahooFinanceClient {
    client: Client,
    base_url: String,
}

impl YahooFinanceClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the client at another chart endpoint
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().user_agent("Mozilla/5.0").build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn chart_url(&self, ticker: &str) -> String {
        format!(
            "{}/{}?range=max&interval=1d&events=div%2Csplit",
            self.base_url.trim_end_matches('/'),
            ticker
        )
    }
}

impl MarketDataProvider for YahooFinanceClient {
    fn fetch_daily(&self, ticker: &str) -> Result<PriceSeries> {
        let url = self.chart_url(ticker);
        log::info!("fetching daily history for {}", ticker);
        log::debug!("GET {}", url);

        let response: ChartResponse = self
            .client
            .get(&url)
            .send()?
            .error_for_status()?
            .json()?;

        parse_chart(ticker, response)
    }
}

fn parse_chart(ticker: &str, response: ChartResponse) -> Result<PriceSeries> {
    if let Some(error) = response.chart.error {
        return Err(RnnError::HttpError(format!(
            "Yahoo Finance error: {} - {}",
            error.code, error.description
        )));
    }

    let data = response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| RnnError::DataError(format!("no chart data returned for '{}'", ticker)))?;

    let timestamps = data
        .timestamp
        .ok_or_else(|| RnnError::DataError(format!("no timestamps returned for '{}'", ticker)))?;
    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| RnnError::DataError(format!("no quote data returned for '{}'", ticker)))?;
    let adjclose = data
        .indicators
        .adjclose
        .and_then(|series| series.into_iter().next());

    let field = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    let mut bars = Vec::with_capacity(timestamps.len());
    let mut skipped = 0usize;
    for (i, &ts) in timestamps.iter().enumerate() {
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
            field(&quote.open, i),
            field(&quote.high, i),
            field(&quote.low, i),
            field(&quote.close, i),
            field(&quote.volume, i),
        ) else {
            skipped += 1;
            continue;
        };

        let adjclose = adjclose
            .as_ref()
            .and_then(|a| field(&a.adjclose, i))
            .unwrap_or(close);

        bars.push(PriceBar {
            date: trading_day(ts)?,
            open,
            high,
            low,
            close,
            adjclose,
            volume,
        });
    }

    if skipped > 0 {
        log::warn!("skipped {} incomplete rows for {}", skipped, ticker);
    }

    PriceSeries::new(ticker, bars)
}

fn trading_day(timestamp: i64) -> Result<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| RnnError::DataError(format!("invalid timestamp {}", timestamp)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> ChartResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_chart_and_skips_incomplete_rows() {
        let json = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1704205800, 1704292200, 1704378600],
                    "indicators": {
                        "quote": [{
                            "open":   [10.0, 11.0, null],
                            "high":   [10.5, 11.5, 12.5],
                            "low":    [9.5, 10.5, 11.5],
                            "close":  [10.2, 11.2, 12.2],
                            "volume": [1000, 1100, 1200]
                        }],
                        "adjclose": [{ "adjclose": [10.1, null, 12.1] }]
                    }
                }],
                "error": null
            }
        }"#;

        let series = parse_chart("XLK", response(json)).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].adjclose, 10.1);
        // missing adjclose falls back to close
        assert_eq!(series.bars()[1].adjclose, 11.2);
        assert_eq!(
            series.bars()[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
    }

    #[test]
    fn surfaces_api_errors() {
        let json = r#"{
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        }"#;

        let err = parse_chart("NOPE", response(json)).unwrap_err();
        assert!(matches!(err, RnnError::HttpError(_)));
        assert!(err.to_string().contains("delisted"));
    }

    #[test]
    fn url_requests_full_daily_history() {
        let client = YahooFinanceClient::with_base_url("http://localhost/chart/").unwrap();
        assert_eq!(
            client.chart_url("XLK"),
            "http://localhost/chart/XLK?range=max&interval=1d&events=div%2Csplit"
        );
    }
}
