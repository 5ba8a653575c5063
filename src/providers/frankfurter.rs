use super::util::HttpSource;
use crate::core::error::FetchError;
use crate::core::market::FxRate;
use anyhow::Result;
use chrono::NaiveDate;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct FrankfurterResponse {
    #[serde(default)]
    rates: HashMap<String, f64>,
    date: Option<NaiveDate>,
}

/// Latest reference rate for one currency pair from api.frankfurter.app.
pub struct FrankfurterProvider {
    http: HttpSource,
    from: String,
    to: String,
}

impl FrankfurterProvider {
    pub fn new(base_url: &str, timeout: Duration, from: &str, to: &str) -> Result<Self> {
        Ok(Self {
            http: HttpSource::new(base_url, timeout, HeaderMap::new())?,
            from: from.to_uppercase(),
            to: to.to_uppercase(),
        })
    }

    #[instrument(name = "FrankfurterRate", skip(self), fields(from = %self.from, to = %self.to))]
    pub async fn fetch_rate(&self) -> Result<FxRate, FetchError> {
        let url = self
            .http
            .url(&format!("latest?from={}&to={}", self.from, self.to));
        let text = self.http.get_text(&url).await?;

        let data: FrankfurterResponse =
            serde_json::from_str(&text).map_err(|e| FetchError::Decode {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let rate = data
            .rates
            .get(&self.to)
            .copied()
            .ok_or_else(|| FetchError::MissingRate {
                currency: self.to.clone(),
            })?;
        debug!(rate, "Received FX rate");

        Ok(FxRate {
            from: self.from.clone(),
            to: self.to.clone(),
            rate,
            date: data.date,
        })
    }
}
