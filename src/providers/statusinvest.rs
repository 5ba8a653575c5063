use super::util::HttpSource;
use crate::core::error::FetchError;
use crate::core::market::Fundamentals;
use crate::core::parse::parse_locale_number;
use anyhow::Result;
use reqwest::header::HeaderMap;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Where the two indicators live in a statusinvest.com.br stock page.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FundamentalsPaths {
    pub earnings_per_share: String,
    pub book_value_per_share: String,
}

impl Default for FundamentalsPaths {
    fn default() -> Self {
        FundamentalsPaths {
            earnings_per_share: "#indicators-section > div:nth-of-type(2) > div > div:nth-of-type(1) > div > div:nth-of-type(11) > div > div > strong".to_string(),
            book_value_per_share: "#indicators-section > div:nth-of-type(2) > div > div:nth-of-type(1) > div > div:nth-of-type(9) > div > div > strong".to_string(),
        }
    }
}

/// Per-ticker earnings and book value from statusinvest.com.br.
pub struct StatusInvestProvider {
    http: HttpSource,
    paths: FundamentalsPaths,
}

impl StatusInvestProvider {
    pub fn new(base_url: &str, timeout: Duration, paths: FundamentalsPaths) -> Result<Self> {
        Ok(Self {
            http: HttpSource::new(base_url, timeout, HeaderMap::new())?,
            paths,
        })
    }

    #[instrument(name = "StatusInvestFundamentals", skip(self), fields(ticker = %ticker))]
    pub async fn fetch_fundamentals(&self, ticker: &str) -> Result<Fundamentals, FetchError> {
        let url = self
            .http
            .url(&format!("acoes/{}", ticker.trim().to_lowercase()));
        let html = self.http.get_text(&url).await?;

        let fundamentals =
            extract_fundamentals(&html, &self.paths).map_err(|reason| FetchError::Decode {
                url: url.clone(),
                reason,
            })?;

        if fundamentals.earnings_per_share == 0.0 && fundamentals.book_value_per_share == 0.0 {
            warn!("EPS and book value not found, Graham value will be zero");
        } else {
            debug!(
                eps = fundamentals.earnings_per_share,
                bvps = fundamentals.book_value_per_share,
                "Found fundamentals"
            );
        }
        Ok(fundamentals)
    }
}

/// Reads both indicators; a missing element counts as zero.
fn extract_fundamentals(html: &str, paths: &FundamentalsPaths) -> Result<Fundamentals, String> {
    let eps = Selector::parse(&paths.earnings_per_share)
        .map_err(|e| format!("invalid EPS selector: {e:?}"))?;
    let bvps = Selector::parse(&paths.book_value_per_share)
        .map_err(|e| format!("invalid book value selector: {e:?}"))?;

    let document = Html::parse_document(html);
    let read = |selector: &Selector| {
        document
            .select(selector)
            .next()
            .map(|element| parse_locale_number(&element.text().collect::<String>()))
            .unwrap_or(0.0)
    };

    Ok(Fundamentals {
        earnings_per_share: read(&eps),
        book_value_per_share: read(&bvps),
    })
}
