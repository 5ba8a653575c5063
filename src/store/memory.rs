use crate::core::config::UserPortfolio;
use crate::core::error::RepositoryError;
use crate::core::market::AssetClass;
use crate::core::portfolio::{Holding, PortfolioRepository, PortfolioWriter};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory holdings store keyed by user id.
#[derive(Clone, Default)]
pub struct MemoryPortfolioRepository {
    inner: Arc<RwLock<HashMap<i64, Vec<Holding>>>>,
}

impl MemoryPortfolioRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_users(users: &[UserPortfolio]) -> Self {
        let holdings = users
            .iter()
            .map(|user| (user.user_id, user.holdings.clone()))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(holdings)),
        }
    }
}

#[async_trait]
impl PortfolioRepository for MemoryPortfolioRepository {
    async fn list_holdings(
        &self,
        user_id: i64,
        class: AssetClass,
    ) -> Result<Vec<Holding>, RepositoryError> {
        let store = self.inner.read().await;
        let mut holdings: Vec<Holding> = store
            .get(&user_id)
            .map(|all| all.iter().filter(|h| h.class == class).cloned().collect())
            .unwrap_or_default();
        holdings.sort_by(|a, b| a.normalized_ticker().cmp(b.normalized_ticker()));
        debug!(user_id, %class, count = holdings.len(), "Listed holdings");
        Ok(holdings)
    }
}

#[async_trait]
impl PortfolioWriter for MemoryPortfolioRepository {
    async fn upsert_holding(&self, user_id: i64, holding: Holding) -> Result<(), RepositoryError> {
        let mut store = self.inner.write().await;
        let holdings = store.entry(user_id).or_default();
        holdings.retain(|h| {
            !(h.class == holding.class && h.normalized_ticker() == holding.normalized_ticker())
        });
        debug!(user_id, ticker = %holding.ticker, "Holding upserted");
        holdings.push(holding);
        Ok(())
    }

    async fn remove_holding(
        &self,
        user_id: i64,
        class: AssetClass,
        ticker: &str,
    ) -> Result<bool, RepositoryError> {
        let mut store = self.inner.write().await;
        let Some(holdings) = store.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = holdings.len();
        holdings.retain(|h| !(h.class == class && h.normalized_ticker() == ticker.trim()));
        Ok(before != holdings.len())
    }
}
