use super::util::HttpSource;
use crate::core::error::FetchError;
use anyhow::Result;
use futures::stream::{self, StreamExt};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[derive(Deserialize, Debug)]
struct YahooPriceResponse {
    chart: PriceChartResult,
}

#[derive(Deserialize, Debug)]
struct PriceChartResult {
    result: Option<Vec<PriceChartItem>>,
}

#[derive(Deserialize, Debug)]
struct PriceChartItem {
    meta: PriceChartMeta,
}

#[derive(Deserialize, Debug)]
struct PriceChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: Option<f64>,
}

/// Last traded prices of foreign tickers from the Yahoo Finance chart API.
pub struct YahooFinanceProvider {
    http: HttpSource,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: HttpSource::new(base_url, timeout, HeaderMap::new())?,
        })
    }

    #[instrument(name = "YahooPriceFetch", skip(self), fields(symbol = %symbol))]
    pub async fn fetch_price(&self, symbol: &str) -> Result<f64, FetchError> {
        let url = self.http.url(&format!("v8/finance/chart/{symbol}"));
        let text = self.http.get_text(&url).await?;

        let data: YahooPriceResponse =
            serde_json::from_str(&text).map_err(|e| FetchError::Decode {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        data.chart
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|item| item.meta.regular_market_price)
            .filter(|price| *price > 0.0)
            .ok_or_else(|| FetchError::Decode {
                url,
                reason: format!("no price data found for symbol: {symbol}"),
            })
    }

    /// Prices every ticker with at most `concurrency` requests in flight.
    /// Failed lookups are logged and left out of the result.
    pub async fn fetch_prices(&self, tickers: &[String], concurrency: usize) -> HashMap<String, f64> {
        let results: Vec<(String, Result<f64, FetchError>)> = stream::iter(tickers.to_vec())
            .map(|ticker| async move {
                let result = self.fetch_price(&ticker).await;
                (ticker, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        results
            .into_iter()
            .filter_map(|(ticker, result)| match result {
                Ok(price) => {
                    debug!(ticker = %ticker, price, "Priced foreign ticker");
                    Some((ticker, price))
                }
                Err(e) => {
                    warn!(ticker = %ticker, error = %e, "Failed to price foreign ticker");
                    None
                }
            })
            .collect()
    }
}
