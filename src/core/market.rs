//! Market data abstractions and core types

use crate::core::error::FetchError;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Equity,
    Fund,
    Foreign,
}

impl Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                AssetClass::Equity => "equity",
                AssetClass::Fund => "fund",
                AssetClass::Foreign => "foreign",
            }
        )
    }
}

/// The two full-market tables kept as snapshots. Foreign assets are priced
/// per ticker and have no table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketTable {
    Equity,
    Fund,
}

impl Display for MarketTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketTable::Equity => write!(f, "equity"),
            MarketTable::Fund => write!(f, "fund"),
        }
    }
}

/// Full-market table for one asset class, keyed by trimmed ticker.
///
/// Each row keeps the raw cell strings in table order, ticker included at
/// column 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketSnapshot {
    rows: HashMap<String, Vec<String>>,
}

impl MarketSnapshot {
    /// Builds a snapshot from scraped table rows.
    ///
    /// Rows with fewer than two cells (headers, spacer rows) are skipped. Any
    /// other row narrower than `expected_columns` means the upstream layout
    /// no longer matches the configured column schema.
    pub fn from_rows<I>(
        source_name: &str,
        rows: I,
        expected_columns: usize,
    ) -> Result<Self, FetchError>
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let mut snapshot = HashMap::new();
        for row in rows {
            if row.len() < 2 {
                continue;
            }
            let ticker = row[0].trim().to_string();
            if row.len() < expected_columns {
                return Err(FetchError::Layout {
                    source_name: source_name.to_string(),
                    ticker,
                    expected: expected_columns,
                    found: row.len(),
                });
            }
            snapshot.insert(ticker, row);
        }
        Ok(Self { rows: snapshot })
    }

    pub fn get(&self, ticker: &str) -> Option<&[String]> {
        self.rows.get(ticker.trim()).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Column offsets of the equity results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct EquityColumns {
    pub price: usize,
    pub price_to_book: usize,
    pub dividend_yield: usize,
}

impl EquityColumns {
    pub fn width(&self) -> usize {
        [self.price, self.price_to_book, self.dividend_yield]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1
    }
}

impl Default for EquityColumns {
    fn default() -> Self {
        Self {
            price: 1,
            price_to_book: 3,
            dividend_yield: 5,
        }
    }
}

/// Column offsets of the real estate fund results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct FundColumns {
    pub segment: usize,
    pub price: usize,
    pub dividend_yield: usize,
    pub price_to_book: usize,
    pub property_count: usize,
    pub vacancy: usize,
}

impl FundColumns {
    pub fn width(&self) -> usize {
        [
            self.segment,
            self.price,
            self.dividend_yield,
            self.price_to_book,
            self.property_count,
            self.vacancy,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

impl Default for FundColumns {
    fn default() -> Self {
        Self {
            segment: 1,
            price: 2,
            dividend_yield: 4,
            price_to_book: 5,
            property_count: 8,
            vacancy: 12,
        }
    }
}

/// Per-ticker inputs of the Graham estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub earnings_per_share: f64,
    pub book_value_per_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxRate {
    pub from: String,
    pub to: String,
    pub rate: f64,
    pub date: Option<NaiveDate>,
}

/// Upstream market data, without any caching.
#[async_trait]
pub trait MarketDataFetcher: Send + Sync {
    async fn fetch_equity_snapshot(&self) -> Result<MarketSnapshot, FetchError>;

    async fn fetch_fund_snapshot(&self) -> Result<MarketSnapshot, FetchError>;

    async fn fetch_fx_rate(&self) -> Result<FxRate, FetchError>;

    async fn fetch_fundamentals(&self, ticker: &str) -> Result<Fundamentals, FetchError>;

    /// Unit prices for a set of foreign tickers. Tickers that could not be
    /// priced are missing from the map; the lookup as a whole never fails.
    async fn fetch_foreign_prices(&self, tickers: &[String]) -> HashMap<String, f64>;
}
