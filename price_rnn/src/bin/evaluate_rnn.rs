//! Evaluate a pretrained network on a ticker's history.
//!
//! Usage: `evaluate_rnn [config.json]`. Without a file the default
//! configuration is used. `PRICE_RNN_TICKER` overrides the ticker.

use price_rnn::{
    CsvPriceCache, MarketDataProvider, Pipeline, PipelineConfig, Result, YahooFinanceClient,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let mut config = match env::args().nth(1) {
        Some(path) => {
            log::info!("reading configuration from {}", path);
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig::default(),
    };
    if let Ok(ticker) = env::var("PRICE_RNN_TICKER") {
        config.ticker = ticker;
    }

    let provider: Box<dyn MarketDataProvider> = match &config.price_csv {
        Some(path) => Box::new(CsvPriceCache::new(path)),
        None => Box::new(YahooFinanceClient::new()?),
    };

    let pipeline = Pipeline::new(config)?;
    let report = pipeline.run(provider.as_ref())?;
    println!("{}", report);

    Ok(())
}
