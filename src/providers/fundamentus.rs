use super::util::HttpSource;
use crate::core::error::FetchError;
use crate::core::market::{EquityColumns, FundColumns, MarketSnapshot};
use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{info, instrument};

const EQUITY_PATH: &str = "resultado.php";
const EQUITY_ROWS: &str = "#resultado > tbody > tr";
const FUND_PATH: &str = "fii_resultado.php";
const FUND_ROWS: &str = "#tabelaResultado > tbody > tr";

/// Scrapes the full-market result tables of fundamentus.com.br.
pub struct FundamentusProvider {
    http: HttpSource,
    equity_columns: EquityColumns,
    fund_columns: FundColumns,
}

impl FundamentusProvider {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        equity_columns: EquityColumns,
        fund_columns: FundColumns,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_str(base_url)?);

        Ok(Self {
            http: HttpSource::new(base_url, timeout, headers)?,
            equity_columns,
            fund_columns,
        })
    }

    #[instrument(name = "FundamentusEquities", skip(self))]
    pub async fn fetch_equities(&self) -> Result<MarketSnapshot, FetchError> {
        self.fetch_table("equity", EQUITY_PATH, EQUITY_ROWS, self.equity_columns.width())
            .await
    }

    #[instrument(name = "FundamentusFunds", skip(self))]
    pub async fn fetch_funds(&self) -> Result<MarketSnapshot, FetchError> {
        self.fetch_table("fund", FUND_PATH, FUND_ROWS, self.fund_columns.width())
            .await
    }

    async fn fetch_table(
        &self,
        source_name: &str,
        path: &str,
        row_selector: &str,
        expected_columns: usize,
    ) -> Result<MarketSnapshot, FetchError> {
        let url = self.http.url(path);
        let html = self.http.get_text(&url).await?;

        let rows = parse_table_rows(&html, row_selector).map_err(|reason| FetchError::Decode {
            url: url.clone(),
            reason,
        })?;
        let snapshot = MarketSnapshot::from_rows(source_name, rows, expected_columns)?;

        info!(
            "Scraped {} table: {} tickers found",
            source_name,
            snapshot.len()
        );
        Ok(snapshot)
    }
}

/// Cell texts of every row matched by `row_selector`, trimmed.
fn parse_table_rows(html: &str, row_selector: &str) -> Result<Vec<Vec<String>>, String> {
    let rows = Selector::parse(row_selector).map_err(|e| format!("invalid selector: {e:?}"))?;
    let cells = Selector::parse("td").map_err(|e| format!("invalid selector: {e:?}"))?;

    let document = Html::parse_document(html);
    Ok(document
        .select(&rows)
        .map(|row| {
            row.select(&cells)
                .map(|cell| cell.text().collect::<String>().trim().to_string())
                .collect()
        })
        .collect())
}
