//! Holdings and the portfolio store they are read from

use crate::core::error::RepositoryError;
use crate::core::market::AssetClass;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Holding {
    pub ticker: String,
    pub class: AssetClass,
    pub quantity: f64,
    /// Quote currency, foreign holdings only.
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Holding {
    /// Ticker as used for joins against market data.
    pub fn normalized_ticker(&self) -> &str {
        self.ticker.trim()
    }
}

#[async_trait]
pub trait PortfolioRepository: Send + Sync {
    /// Holdings of one asset class for a user, ordered by ticker.
    async fn list_holdings(
        &self,
        user_id: i64,
        class: AssetClass,
    ) -> Result<Vec<Holding>, RepositoryError>;
}

/// Write side of the portfolio store.
#[async_trait]
pub trait PortfolioWriter: Send + Sync {
    /// Adds the holding, replacing one with the same class and ticker.
    async fn upsert_holding(&self, user_id: i64, holding: Holding) -> Result<(), RepositoryError>;

    /// Returns whether a holding was removed.
    async fn remove_holding(
        &self,
        user_id: i64,
        class: AssetClass,
        ticker: &str,
    ) -> Result<bool, RepositoryError>;
}
