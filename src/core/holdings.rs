//! Holding changes, keeping the market cache consistent with them.

use crate::core::cache::MarketCache;
use crate::core::error::RepositoryError;
use crate::core::market::AssetClass;
use crate::core::portfolio::{Holding, PortfolioWriter};
use std::sync::Arc;
use tracing::{info, instrument};

/// Writes holdings and drops the cached market data of the affected class,
/// so the next enrichment reflects the change.
pub struct HoldingsService {
    writer: Arc<dyn PortfolioWriter>,
    cache: Arc<MarketCache>,
}

impl HoldingsService {
    pub fn new(writer: Arc<dyn PortfolioWriter>, cache: Arc<MarketCache>) -> Self {
        Self { writer, cache }
    }

    /// Adds a holding or updates the one with the same class and ticker.
    #[instrument(name = "SaveHolding", skip(self, holding), fields(ticker = %holding.ticker))]
    pub async fn save_holding(&self, user_id: i64, holding: Holding) -> Result<(), RepositoryError> {
        let class = holding.class;
        self.writer.upsert_holding(user_id, holding).await?;
        self.invalidate(class).await;
        Ok(())
    }

    #[instrument(name = "RemoveHolding", skip(self))]
    pub async fn remove_holding(
        &self,
        user_id: i64,
        class: AssetClass,
        ticker: &str,
    ) -> Result<bool, RepositoryError> {
        let removed = self.writer.remove_holding(user_id, class, ticker).await?;
        if removed {
            self.invalidate(class).await;
        }
        Ok(removed)
    }

    async fn invalidate(&self, class: AssetClass) {
        info!(%class, "Holdings changed, invalidating market cache");
        match class {
            AssetClass::Equity | AssetClass::Fund => self.cache.invalidate_domestic().await,
            AssetClass::Foreign => self.cache.invalidate_foreign().await,
        }
    }
}
