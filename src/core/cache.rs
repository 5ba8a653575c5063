use crate::core::market::{FxRate, MarketSnapshot, MarketTable};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Freshness window used when the configuration does not override it.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

struct CacheEntry<V> {
    value: V,
    fetched_at: Instant,
}

/// In-memory cache whose entries go stale after a fixed TTL.
///
/// Staleness is checked lazily on `get`; stale entries are never swept and
/// stay in memory until overwritten or removed. Concurrent readers share a
/// read lock, writers take it exclusively. Two callers racing on a miss may
/// both `set`; the last write wins.
pub struct TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: RwLock<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + Debug,
    V: Clone + Send + Sync,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let cache = self.inner.read().await;
        match cache.get(key) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => {
                debug!("Cache HIT for key: {:?}", key);
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!("Cache entry expired for key: {:?}", key);
                None
            }
            None => {
                debug!("Cache MISS for key: {:?}", key);
                None
            }
        }
    }

    pub async fn set(&self, key: K, value: V) {
        let entry = CacheEntry {
            value,
            fetched_at: Instant::now(),
        };
        let mut cache = self.inner.write().await;
        debug!("Cache SET for key: {:?}", key);
        cache.insert(key, entry);
    }

    pub async fn remove(&self, key: &K) -> bool {
        let mut cache = self.inner.write().await;
        debug!("Cache REMOVE for key: {:?}", key);
        cache.remove(key).is_some()
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
        debug!("Cache CLEAR");
    }

    /// Number of stored entries, stale ones included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + Debug,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

/// The process-wide market data caches, one typed cache per value kind.
///
/// Built once at startup and shared by every `Enricher` through an `Arc`.
pub struct MarketCache {
    pub snapshots: TtlCache<MarketTable, Arc<MarketSnapshot>>,
    pub fx_rates: TtlCache<String, FxRate>,
    pub foreign_prices: TtlCache<String, Arc<HashMap<String, f64>>>,
}

impl MarketCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            snapshots: TtlCache::new(ttl),
            fx_rates: TtlCache::new(ttl),
            foreign_prices: TtlCache::new(ttl),
        }
    }

    /// Drops the equity and fund snapshots so the next read refetches them.
    pub async fn invalidate_domestic(&self) {
        self.snapshots.remove(&MarketTable::Equity).await;
        self.snapshots.remove(&MarketTable::Fund).await;
        debug!("Domestic snapshots invalidated");
    }

    /// Drops every cached foreign price map. The FX rate is kept.
    pub async fn invalidate_foreign(&self) {
        self.foreign_prices.clear().await;
        debug!("Foreign price maps invalidated");
    }
}

impl Default for MarketCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
