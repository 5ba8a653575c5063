use crate::core::error::FetchError;
use anyhow::Result;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::debug;

/// Identifies our requests to the upstream sites. Some of them reject
/// clients without a browser-like agent.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) carteira/0.1";

/// Default deadline for a single outbound request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// A base URL plus a client carrying the identification headers and the
/// per-request deadline. Requests are attempted exactly once.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration, mut headers: HeaderMap) -> Result<Self> {
        headers
            .entry(ACCEPT_LANGUAGE)
            .or_insert(HeaderValue::from_static("pt-BR,pt;q=0.9,en;q=0.8"));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GETs `url` and returns the body of a successful response.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        debug!("Requesting {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, self.timeout, e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, self.timeout, e))
    }
}
