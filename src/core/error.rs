//! Error types of the enrichment core.

use crate::core::market::MarketTable;
use std::time::Duration;
use thiserror::Error;

/// Failure talking to, or understanding, an upstream market data source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("HTTP error: {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error(
        "unexpected {source_name} table layout: row {ticker} has {found} columns, expected at least {expected}"
    )]
    Layout {
        source_name: String,
        ticker: String,
        expected: usize,
        found: usize,
    },

    #[error("FX response has no rate for {currency}")]
    MissingRate { currency: String },
}

impl FetchError {
    /// Classifies a reqwest failure, keeping timeouts distinct.
    pub fn from_reqwest(url: &str, timeout: Duration, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout,
            }
        } else {
            FetchError::Request {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// The portfolio store could not be read.
#[derive(Debug, Error)]
#[error("data access failed: {0}")]
pub struct RepositoryError(pub String);

/// Fatal failure of one enrichment call. Only the class being enriched is
/// affected; per-ticker failures are logged and never surface here.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("failed to fetch {table} market snapshot")]
    Snapshot {
        table: MarketTable,
        #[source]
        source: FetchError,
    },

    #[error("failed to fetch FX rate")]
    FxRate(#[source] FetchError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
