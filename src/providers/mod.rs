pub mod frankfurter;
pub mod fundamentus;
pub mod statusinvest;
pub mod util;
pub mod yahoo_finance;

use crate::core::config::AppConfig;
use crate::core::error::FetchError;
use crate::core::market::{Fundamentals, FxRate, MarketDataFetcher, MarketSnapshot};
use anyhow::Result;
use async_trait::async_trait;
use frankfurter::FrankfurterProvider;
use fundamentus::FundamentusProvider;
use statusinvest::StatusInvestProvider;
use std::collections::HashMap;
use yahoo_finance::YahooFinanceProvider;

/// `MarketDataFetcher` backed by the public web sources.
pub struct HttpMarketDataFetcher {
    fundamentus: FundamentusProvider,
    statusinvest: StatusInvestProvider,
    frankfurter: FrankfurterProvider,
    yahoo: YahooFinanceProvider,
    max_concurrent_requests: usize,
}

impl HttpMarketDataFetcher {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let market = &config.market;
        let timeout = market.request_timeout();

        Ok(Self {
            fundamentus: FundamentusProvider::new(
                config.providers.fundamentus_url(),
                timeout,
                market.equity_columns,
                market.fund_columns,
            )?,
            statusinvest: StatusInvestProvider::new(
                config.providers.statusinvest_url(),
                timeout,
                market.fundamentals.clone(),
            )?,
            frankfurter: FrankfurterProvider::new(
                config.providers.frankfurter_url(),
                timeout,
                &config.fx.from,
                &config.fx.to,
            )?,
            yahoo: YahooFinanceProvider::new(config.providers.yahoo_url(), timeout)?,
            max_concurrent_requests: market.max_concurrent_requests,
        })
    }
}

#[async_trait]
impl MarketDataFetcher for HttpMarketDataFetcher {
    async fn fetch_equity_snapshot(&self) -> Result<MarketSnapshot, FetchError> {
        self.fundamentus.fetch_equities().await
    }

    async fn fetch_fund_snapshot(&self) -> Result<MarketSnapshot, FetchError> {
        self.fundamentus.fetch_funds().await
    }

    async fn fetch_fx_rate(&self) -> Result<FxRate, FetchError> {
        self.frankfurter.fetch_rate().await
    }

    async fn fetch_fundamentals(&self, ticker: &str) -> Result<Fundamentals, FetchError> {
        self.statusinvest.fetch_fundamentals(ticker).await
    }

    async fn fetch_foreign_prices(&self, tickers: &[String]) -> HashMap<String, f64> {
        self.yahoo
            .fetch_prices(tickers, self.max_concurrent_requests)
            .await
    }
}
