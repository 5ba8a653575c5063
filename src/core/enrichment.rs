//! Joins a user's holdings with cached market data.
use crate::core::cache::MarketCache;
use crate::core::error::{EnrichmentError, FetchError};
use crate::core::market::{
    AssetClass, EquityColumns, Fundamentals, FundColumns, FxRate, MarketDataFetcher,
    MarketSnapshot, MarketTable,
};
use crate::core::parse::parse_locale_number;
use crate::core::portfolio::PortfolioRepository;
use crate::core::valuation::{graham_value, is_graham_advantageous};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, instrument, warn};

/// Concurrent upstream requests allowed when nothing else is configured.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichedEquity {
    pub ticker: String,
    pub quantity: f64,
    pub price: f64,
    pub total_value: f64,
    pub price_to_book: f64,
    /// Trailing dividend yield as a fraction (0.12 for 12%).
    pub dividend_yield: f64,
    pub dividend_yield_percent: f64,
    pub graham_value: f64,
    pub is_graham_advantageous: bool,
}

impl EnrichedEquity {
    fn apply_fundamentals(&mut self, fundamentals: &Fundamentals) {
        self.graham_value = graham_value(
            fundamentals.earnings_per_share,
            fundamentals.book_value_per_share,
        );
        self.is_graham_advantageous = is_graham_advantageous(self.graham_value, self.price);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichedFund {
    pub ticker: String,
    pub quantity: f64,
    pub price: f64,
    pub total_value: f64,
    pub segment: String,
    pub price_to_book: f64,
    pub dividend_yield: f64,
    pub dividend_yield_percent: f64,
    pub vacancy: f64,
    pub property_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichedForeignAsset {
    pub ticker: String,
    pub description: Option<String>,
    pub quantity: f64,
    pub currency: Option<String>,
    pub unit_price: f64,
    /// Value in the asset's quote currency.
    pub total_value: f64,
    /// Value converted with the resolved FX rate.
    pub total_value_local: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeignPortfolio {
    pub assets: Vec<EnrichedForeignAsset>,
    pub fx_rate: FxRate,
}

/// Every asset class of one user, each enriched independently. A failed
/// class does not affect the others.
#[derive(Debug)]
pub struct PortfolioOverview {
    pub equities: Result<Vec<EnrichedEquity>, EnrichmentError>,
    pub funds: Result<Vec<EnrichedFund>, EnrichmentError>,
    pub foreign: Result<ForeignPortfolio, EnrichmentError>,
}

/// Enriches holdings with market data, going upstream only on cache misses.
pub struct Enricher {
    repository: Arc<dyn PortfolioRepository>,
    fetcher: Arc<dyn MarketDataFetcher>,
    cache: Arc<MarketCache>,
    equity_columns: EquityColumns,
    fund_columns: FundColumns,
    permits: Arc<Semaphore>,
}

impl Enricher {
    pub fn new(
        repository: Arc<dyn PortfolioRepository>,
        fetcher: Arc<dyn MarketDataFetcher>,
        cache: Arc<MarketCache>,
    ) -> Self {
        Self {
            repository,
            fetcher,
            cache,
            equity_columns: EquityColumns::default(),
            fund_columns: FundColumns::default(),
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_REQUESTS)),
        }
    }

    pub fn with_columns(mut self, equity: EquityColumns, fund: FundColumns) -> Self {
        self.equity_columns = equity;
        self.fund_columns = fund;
        self
    }

    pub fn with_max_concurrent_requests(mut self, limit: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    #[instrument(name = "GetEquities", skip(self))]
    pub async fn get_equities(&self, user_id: i64) -> Result<Vec<EnrichedEquity>, EnrichmentError> {
        info!("Enriching equity holdings");
        let holdings = self
            .repository
            .list_holdings(user_id, AssetClass::Equity)
            .await?;
        let snapshot = self.snapshot(MarketTable::Equity).await?;

        let columns = self.equity_columns;
        let mut equities: Vec<EnrichedEquity> = holdings
            .iter()
            .map(|holding| {
                let ticker = holding.normalized_ticker();
                let mut equity = EnrichedEquity {
                    ticker: ticker.to_string(),
                    quantity: holding.quantity,
                    ..Default::default()
                };
                match snapshot.get(ticker) {
                    Some(row) => {
                        equity.price = cell_number(row, columns.price);
                        equity.price_to_book = cell_number(row, columns.price_to_book);
                        equity.dividend_yield = cell_number(row, columns.dividend_yield) / 100.0;
                        equity.dividend_yield_percent = equity.dividend_yield * 100.0;
                        equity.total_value = equity.price * equity.quantity;
                    }
                    None => warn!(ticker, "Equity ticker not found in market snapshot"),
                }
                equity
            })
            .collect();

        self.apply_valuations(&mut equities).await;
        Ok(equities)
    }

    /// Fetches fundamentals for every equity with bounded concurrency and
    /// writes each estimate into that equity's own slot. Waits for all
    /// tasks; a failed task leaves its slot's valuation at zero.
    async fn apply_valuations(&self, equities: &mut [EnrichedEquity]) {
        let mut tasks = JoinSet::new();
        for (index, equity) in equities.iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let permits = Arc::clone(&self.permits);
            let ticker = equity.ticker.clone();
            tasks.spawn(
                async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        warn!(ticker = %ticker, "Request limiter closed, skipping valuation");
                        return (index, None);
                    };
                    match fetcher.fetch_fundamentals(&ticker).await {
                        Ok(fundamentals) => (index, Some(fundamentals)),
                        Err(e) => {
                            warn!(
                                ticker = %ticker,
                                error = %e,
                                "Failed to fetch fundamentals, skipping valuation"
                            );
                            (index, None)
                        }
                    }
                }
                .in_current_span(),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Some(fundamentals))) => {
                    equities[index].apply_fundamentals(&fundamentals);
                }
                Ok((_, None)) => {}
                Err(e) => warn!(error = %e, "Fundamentals task did not complete"),
            }
        }
    }

    #[instrument(name = "GetFunds", skip(self))]
    pub async fn get_funds(&self, user_id: i64) -> Result<Vec<EnrichedFund>, EnrichmentError> {
        info!("Enriching fund holdings");
        let holdings = self
            .repository
            .list_holdings(user_id, AssetClass::Fund)
            .await?;
        let snapshot = self.snapshot(MarketTable::Fund).await?;

        let columns = self.fund_columns;
        let funds = holdings
            .iter()
            .map(|holding| {
                let ticker = holding.normalized_ticker();
                let mut fund = EnrichedFund {
                    ticker: ticker.to_string(),
                    quantity: holding.quantity,
                    ..Default::default()
                };
                match snapshot.get(ticker) {
                    Some(row) => {
                        fund.segment = cell(row, columns.segment).trim().to_string();
                        fund.price = cell_number(row, columns.price);
                        fund.dividend_yield = cell_number(row, columns.dividend_yield) / 100.0;
                        fund.dividend_yield_percent = fund.dividend_yield * 100.0;
                        fund.price_to_book = cell_number(row, columns.price_to_book);
                        fund.vacancy = cell_number(row, columns.vacancy);
                        fund.property_count = cell(row, columns.property_count)
                            .trim()
                            .parse()
                            .unwrap_or(0);
                        fund.total_value = fund.price * fund.quantity;
                    }
                    None => warn!(ticker, "Fund ticker not found in market snapshot"),
                }
                fund
            })
            .collect();

        Ok(funds)
    }

    #[instrument(name = "GetForeignAssets", skip(self))]
    pub async fn get_foreign_assets(
        &self,
        user_id: i64,
    ) -> Result<ForeignPortfolio, EnrichmentError> {
        info!("Enriching foreign holdings");
        let holdings = self
            .repository
            .list_holdings(user_id, AssetClass::Foreign)
            .await?;
        let fx_rate = self.fx_rate().await?;

        if holdings.is_empty() {
            return Ok(ForeignPortfolio {
                assets: Vec::new(),
                fx_rate,
            });
        }

        let tickers: BTreeSet<String> = holdings
            .iter()
            .map(|h| h.normalized_ticker().to_string())
            .collect();
        let prices = self.foreign_prices(tickers).await;

        let assets = holdings
            .iter()
            .map(|holding| {
                let ticker = holding.normalized_ticker();
                let mut asset = EnrichedForeignAsset {
                    ticker: ticker.to_string(),
                    description: holding.description.clone(),
                    quantity: holding.quantity,
                    currency: holding.currency.clone(),
                    ..Default::default()
                };
                match prices.get(ticker) {
                    Some(price) => {
                        asset.unit_price = *price;
                        asset.total_value = asset.unit_price * asset.quantity;
                        asset.total_value_local = asset.total_value * fx_rate.rate;
                    }
                    None => warn!(ticker, "Foreign ticker has no market price"),
                }
                asset
            })
            .collect();

        Ok(ForeignPortfolio { assets, fx_rate })
    }

    /// Enriches the three asset classes concurrently and waits for all of
    /// them.
    #[instrument(name = "GetPortfolio", skip(self))]
    pub async fn get_portfolio(&self, user_id: i64) -> PortfolioOverview {
        let (equities, funds, foreign) = tokio::join!(
            self.get_equities(user_id),
            self.get_funds(user_id),
            self.get_foreign_assets(user_id),
        );
        PortfolioOverview {
            equities,
            funds,
            foreign,
        }
    }

    async fn snapshot(&self, table: MarketTable) -> Result<Arc<MarketSnapshot>, EnrichmentError> {
        if let Some(cached) = self.cache.snapshots.get(&table).await {
            debug!(%table, "Using cached market snapshot");
            return Ok(cached);
        }

        let result: Result<MarketSnapshot, FetchError> = match table {
            MarketTable::Equity => self.fetcher.fetch_equity_snapshot().await,
            MarketTable::Fund => self.fetcher.fetch_fund_snapshot().await,
        };
        let snapshot =
            Arc::new(result.map_err(|source| EnrichmentError::Snapshot { table, source })?);
        info!(%table, rows = snapshot.len(), "Fetched market snapshot");

        self.cache.snapshots.set(table, Arc::clone(&snapshot)).await;
        Ok(snapshot)
    }

    async fn fx_rate(&self) -> Result<FxRate, EnrichmentError> {
        // One configured pair per process.
        let key = "fx_rate".to_string();
        if let Some(cached) = self.cache.fx_rates.get(&key).await {
            debug!("Using cached FX rate");
            return Ok(cached);
        }

        let rate = self
            .fetcher
            .fetch_fx_rate()
            .await
            .map_err(EnrichmentError::FxRate)?;
        self.cache.fx_rates.set(key, rate.clone()).await;
        Ok(rate)
    }

    async fn foreign_prices(&self, tickers: BTreeSet<String>) -> Arc<HashMap<String, f64>> {
        let tickers: Vec<String> = tickers.into_iter().collect();
        let key = tickers.join(",");
        if let Some(cached) = self.cache.foreign_prices.get(&key).await {
            debug!("Using cached foreign prices");
            return cached;
        }

        let prices = Arc::new(self.fetcher.fetch_foreign_prices(&tickers).await);
        info!(
            priced = prices.len(),
            requested = tickers.len(),
            "Fetched foreign prices"
        );
        self.cache.foreign_prices.set(key, Arc::clone(&prices)).await;
        prices
    }
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map_or("", String::as_str)
}

fn cell_number(row: &[String], index: usize) -> f64 {
    parse_locale_number(cell(row, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::RepositoryError;
    use crate::core::portfolio::Holding;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockRepository {
        holdings: Vec<Holding>,
        fail: bool,
    }

    impl MockRepository {
        fn new(holdings: Vec<Holding>) -> Self {
            Self {
                holdings,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl PortfolioRepository for MockRepository {
        async fn list_holdings(
            &self,
            _user_id: i64,
            class: AssetClass,
        ) -> Result<Vec<Holding>, RepositoryError> {
            if self.fail {
                return Err(RepositoryError("connection refused".to_string()));
            }
            Ok(self
                .holdings
                .iter()
                .filter(|h| h.class == class)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct MockFetcher {
        equity_rows: Vec<Vec<String>>,
        fund_rows: Vec<Vec<String>>,
        fundamentals: HashMap<String, Fundamentals>,
        foreign_prices: HashMap<String, f64>,
        fx_rate: Option<f64>,
        fail_snapshots: bool,
        panic_on: Option<String>,
        upstream_delay: Duration,
        snapshot_calls: AtomicUsize,
        fx_calls: AtomicUsize,
        foreign_calls: AtomicUsize,
        fundamentals_requested: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataFetcher for MockFetcher {
        async fn fetch_equity_snapshot(&self) -> Result<MarketSnapshot, FetchError> {
            self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.upstream_delay).await;
            if self.fail_snapshots {
                return Err(FetchError::Decode {
                    url: "mock://equities".to_string(),
                    reason: "boom".to_string(),
                });
            }
            MarketSnapshot::from_rows("equity", self.equity_rows.clone(), 6)
        }

        async fn fetch_fund_snapshot(&self) -> Result<MarketSnapshot, FetchError> {
            self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.upstream_delay).await;
            MarketSnapshot::from_rows("fund", self.fund_rows.clone(), 13)
        }

        async fn fetch_fx_rate(&self) -> Result<FxRate, FetchError> {
            self.fx_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.upstream_delay).await;
            let rate = self.fx_rate.ok_or_else(|| FetchError::MissingRate {
                currency: "BRL".to_string(),
            })?;
            Ok(FxRate {
                from: "USD".to_string(),
                to: "BRL".to_string(),
                rate,
                date: None,
            })
        }

        async fn fetch_fundamentals(&self, ticker: &str) -> Result<Fundamentals, FetchError> {
            if self.panic_on.as_deref() == Some(ticker) {
                panic!("fundamentals source crashed for {ticker}");
            }
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.fundamentals_requested
                .lock()
                .unwrap()
                .push(ticker.to_string());
            self.fundamentals
                .get(ticker)
                .copied()
                .ok_or_else(|| FetchError::Decode {
                    url: format!("mock://fundamentals/{ticker}"),
                    reason: "no data".to_string(),
                })
        }

        async fn fetch_foreign_prices(&self, tickers: &[String]) -> HashMap<String, f64> {
            self.foreign_calls.fetch_add(1, Ordering::SeqCst);
            tickers
                .iter()
                .filter_map(|t| self.foreign_prices.get(t).map(|p| (t.clone(), *p)))
                .collect()
        }
    }

    fn holding(ticker: &str, class: AssetClass, quantity: f64) -> Holding {
        Holding {
            ticker: ticker.to_string(),
            class,
            quantity,
            currency: None,
            description: None,
        }
    }

    fn equity_row(ticker: &str, price: &str, pvp: &str, dy: &str) -> Vec<String> {
        [ticker, price, "5,10", pvp, "0,80", dy]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    fn fundamentals(eps: f64, bvps: f64) -> Fundamentals {
        Fundamentals {
            earnings_per_share: eps,
            book_value_per_share: bvps,
        }
    }

    fn enricher(repo: MockRepository, fetcher: Arc<MockFetcher>) -> Enricher {
        Enricher::new(Arc::new(repo), fetcher, Arc::new(MarketCache::default()))
    }

    #[tokio::test]
    async fn test_equities_are_joined_and_valued() {
        let fetcher = Arc::new(MockFetcher {
            equity_rows: vec![equity_row("PETR4", "38,10", "1,15", "12,50%")],
            fundamentals: HashMap::from([("PETR4".to_string(), fundamentals(4.0, 10.0))]),
            ..Default::default()
        });
        let repo = MockRepository::new(vec![holding("PETR4 ", AssetClass::Equity, 100.0)]);

        let equities = enricher(repo, fetcher).get_equities(1).await.unwrap();

        assert_eq!(equities.len(), 1);
        let petr = &equities[0];
        assert_eq!(petr.ticker, "PETR4");
        assert_eq!(petr.price, 38.1);
        assert!((petr.total_value - 3810.0).abs() < 1e-9);
        assert_eq!(petr.price_to_book, 1.15);
        assert!((petr.dividend_yield - 0.125).abs() < 1e-12);
        assert!((petr.dividend_yield_percent - 12.5).abs() < 1e-9);
        assert!((petr.graham_value - 30.0).abs() < 1e-9);
        assert!(!petr.is_graham_advantageous);
    }

    #[tokio::test]
    async fn test_missing_ticker_is_zeroed_not_fatal() {
        let fetcher = Arc::new(MockFetcher {
            equity_rows: vec![equity_row("VALE3", "61,00", "1,50", "9%")],
            ..Default::default()
        });
        let repo = MockRepository::new(vec![holding("XPTO3", AssetClass::Equity, 10.0)]);

        let equities = enricher(repo, fetcher).get_equities(1).await.unwrap();

        assert_eq!(equities.len(), 1);
        assert_eq!(equities[0].ticker, "XPTO3");
        assert_eq!(equities[0].price, 0.0);
        assert_eq!(equities[0].total_value, 0.0);
        assert_eq!(equities[0].graham_value, 0.0);
    }

    #[tokio::test]
    async fn test_fundamentals_failure_is_isolated() {
        let tickers = ["AAAA3", "BBBB3", "CCCC3", "DDDD3", "EEEE3"];
        let fetcher = Arc::new(MockFetcher {
            equity_rows: tickers
                .iter()
                .map(|t| equity_row(t, "10,00", "1,00", "5%"))
                .collect(),
            // No fundamentals for CCCC3, so its fetch fails
            fundamentals: tickers
                .iter()
                .filter(|t| **t != "CCCC3")
                .map(|t| (t.to_string(), fundamentals(2.0, 8.0)))
                .collect(),
            ..Default::default()
        });
        let repo = MockRepository::new(
            tickers
                .iter()
                .map(|t| holding(t, AssetClass::Equity, 1.0))
                .collect(),
        );

        let equities = enricher(repo, fetcher).get_equities(1).await.unwrap();

        assert_eq!(equities.len(), 5);
        for equity in &equities {
            if equity.ticker == "CCCC3" {
                assert_eq!(equity.graham_value, 0.0);
                assert!(!equity.is_graham_advantageous);
            } else {
                assert!((equity.graham_value - 18.97).abs() < 0.01);
                assert!(equity.is_graham_advantageous);
            }
        }
    }

    #[tokio::test]
    async fn test_fan_out_fills_every_slot_once_within_limit() {
        let count = 24;
        let tickers: Vec<String> = (0..count).map(|i| format!("T{i:03}3")).collect();
        let fetcher = Arc::new(MockFetcher {
            equity_rows: tickers
                .iter()
                .map(|t| equity_row(t, "1,00", "1,00", "1%"))
                .collect(),
            fundamentals: tickers
                .iter()
                .enumerate()
                .map(|(i, t)| (t.clone(), fundamentals(i as f64 + 1.0, 1.0)))
                .collect(),
            ..Default::default()
        });
        let repo = MockRepository::new(
            tickers
                .iter()
                .map(|t| holding(t, AssetClass::Equity, 1.0))
                .collect(),
        );

        let enricher = enricher(repo, Arc::clone(&fetcher)).with_max_concurrent_requests(3);
        let equities = enricher.get_equities(1).await.unwrap();

        let requested = fetcher.fundamentals_requested.lock().unwrap().clone();
        assert_eq!(requested.len(), count);
        assert_eq!(requested.iter().collect::<HashSet<_>>().len(), count);
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 3);

        // Output order follows the holdings, each slot carrying its own estimate
        for (i, equity) in equities.iter().enumerate() {
            assert_eq!(equity.ticker, tickers[i]);
            let expected = graham_value(i as f64 + 1.0, 1.0);
            assert!((equity.graham_value - expected).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn test_panicking_fundamentals_task_is_isolated() {
        let fetcher = Arc::new(MockFetcher {
            equity_rows: vec![
                equity_row("PETR4", "38,10", "1,15", "12%"),
                equity_row("VALE3", "61,00", "1,50", "9%"),
            ],
            fundamentals: HashMap::from([("PETR4".to_string(), fundamentals(4.0, 10.0))]),
            panic_on: Some("VALE3".to_string()),
            ..Default::default()
        });
        let repo = MockRepository::new(vec![
            holding("PETR4", AssetClass::Equity, 1.0),
            holding("VALE3", AssetClass::Equity, 1.0),
        ]);

        let equities = enricher(repo, fetcher).get_equities(1).await.unwrap();

        assert_eq!(equities.len(), 2);
        assert!((equities[0].graham_value - 30.0).abs() < 1e-9);
        assert_eq!(equities[1].ticker, "VALE3");
        assert_eq!(equities[1].price, 61.0);
        assert_eq!(equities[1].graham_value, 0.0);
    }

    #[tokio::test]
    async fn test_closed_limiter_skips_valuations() {
        let fetcher = Arc::new(MockFetcher {
            equity_rows: vec![equity_row("PETR4", "38,10", "1,15", "12%")],
            fundamentals: HashMap::from([("PETR4".to_string(), fundamentals(4.0, 10.0))]),
            ..Default::default()
        });
        let repo = MockRepository::new(vec![holding("PETR4", AssetClass::Equity, 1.0)]);
        let enricher = enricher(repo, Arc::clone(&fetcher));
        enricher.permits.close();

        let equities = enricher.get_equities(1).await.unwrap();

        assert_eq!(equities[0].price, 38.1);
        assert_eq!(equities[0].graham_value, 0.0);
        assert!(fetcher.fundamentals_requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_portfolio_classes_run_concurrently() {
        let delay = Duration::from_millis(300);
        let fetcher = Arc::new(MockFetcher {
            equity_rows: vec![equity_row("PETR4", "38,10", "1,15", "12%")],
            fund_rows: Vec::new(),
            fx_rate: Some(5.0),
            foreign_prices: HashMap::from([("VOO".to_string(), 400.0)]),
            upstream_delay: delay,
            ..Default::default()
        });
        let repo = MockRepository::new(vec![
            holding("PETR4", AssetClass::Equity, 1.0),
            holding("VOO", AssetClass::Foreign, 1.0),
        ]);

        let started = std::time::Instant::now();
        let overview = enricher(repo, fetcher).get_portfolio(1).await;
        let elapsed = started.elapsed();

        assert!(elapsed < delay * 2, "classes took {elapsed:?}");
        assert_eq!(overview.equities.unwrap()[0].price, 38.1);
        assert!(overview.funds.unwrap().is_empty());
        assert_eq!(overview.foreign.unwrap().assets[0].unit_price, 400.0);
    }

    #[tokio::test]
    async fn test_portfolio_isolates_failed_class() {
        let fetcher = Arc::new(MockFetcher {
            fail_snapshots: true,
            ..Default::default()
        });
        let repo = MockRepository::new(vec![holding("PETR4", AssetClass::Equity, 1.0)]);

        let overview = enricher(repo, fetcher).get_portfolio(1).await;

        assert!(matches!(
            overview.equities,
            Err(EnrichmentError::Snapshot { .. })
        ));
        assert!(overview.funds.unwrap().is_empty());
        assert!(matches!(
            overview.foreign,
            Err(EnrichmentError::FxRate(FetchError::MissingRate { .. }))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_is_cached_between_calls() {
        let fetcher = Arc::new(MockFetcher {
            equity_rows: vec![equity_row("PETR4", "38,10", "1,15", "12%")],
            ..Default::default()
        });
        let repo = MockRepository::new(vec![holding("PETR4", AssetClass::Equity, 1.0)]);
        let cache = Arc::new(MarketCache::default());
        let enricher = Enricher::new(Arc::new(repo), fetcher.clone(), Arc::clone(&cache));

        enricher.get_equities(1).await.unwrap();
        enricher.get_equities(1).await.unwrap();
        assert_eq!(fetcher.snapshot_calls.load(Ordering::SeqCst), 1);

        cache.invalidate_domestic().await;
        enricher.get_equities(1).await.unwrap();
        assert_eq!(fetcher.snapshot_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_snapshot_failure_is_surfaced() {
        let fetcher = Arc::new(MockFetcher {
            fail_snapshots: true,
            ..Default::default()
        });
        let repo = MockRepository::new(vec![holding("PETR4", AssetClass::Equity, 1.0)]);
        let enricher = enricher(repo, fetcher);

        let err = enricher.get_equities(1).await.unwrap_err();
        assert!(matches!(
            err,
            EnrichmentError::Snapshot {
                table: MarketTable::Equity,
                ..
            }
        ));

        // Funds are independent of the equity failure
        assert!(enricher.get_funds(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repository_failure_is_surfaced() {
        let fetcher = Arc::new(MockFetcher::default());
        let repo = MockRepository {
            holdings: Vec::new(),
            fail: true,
        };

        let err = enricher(repo, fetcher).get_funds(1).await.unwrap_err();
        assert!(matches!(err, EnrichmentError::Repository(_)));
    }

    #[tokio::test]
    async fn test_funds_use_fund_layout() {
        let row: Vec<String> = [
            "MXRF11 ",
            "Papéis",
            "10,25",
            "0,12",
            "12,40%",
            "1,02",
            "x",
            "x",
            "0",
            "x",
            "x",
            "x",
            "0,00%",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        let fetcher = Arc::new(MockFetcher {
            fund_rows: vec![row],
            ..Default::default()
        });
        let repo = MockRepository::new(vec![
            holding("MXRF11", AssetClass::Fund, 50.0),
            holding("HGLG11", AssetClass::Fund, 5.0),
        ]);

        let funds = enricher(repo, fetcher).get_funds(1).await.unwrap();

        assert_eq!(funds.len(), 2);
        let mxrf = &funds[0];
        assert_eq!(mxrf.segment, "Papéis");
        assert_eq!(mxrf.price, 10.25);
        assert!((mxrf.total_value - 512.5).abs() < 1e-9);
        assert!((mxrf.dividend_yield - 0.124).abs() < 1e-12);
        assert_eq!(mxrf.price_to_book, 1.02);
        assert_eq!(mxrf.property_count, 0);
        assert_eq!(mxrf.vacancy, 0.0);

        assert_eq!(funds[1].ticker, "HGLG11");
        assert_eq!(funds[1].price, 0.0);
    }

    #[tokio::test]
    async fn test_foreign_assets_use_fx_rate() {
        let fetcher = Arc::new(MockFetcher {
            fx_rate: Some(5.0),
            foreign_prices: HashMap::from([("VOO".to_string(), 400.0)]),
            ..Default::default()
        });
        let mut voo = holding("VOO ", AssetClass::Foreign, 10.5);
        voo.currency = Some("USD".to_string());
        let repo = MockRepository::new(vec![voo, holding("IVV", AssetClass::Foreign, 2.0)]);
        let cache = Arc::new(MarketCache::default());
        let enricher = Enricher::new(Arc::new(repo), fetcher.clone(), Arc::clone(&cache));

        let portfolio = enricher.get_foreign_assets(1).await.unwrap();

        assert_eq!(portfolio.fx_rate.rate, 5.0);
        assert_eq!(portfolio.assets.len(), 2);
        let voo = &portfolio.assets[0];
        assert_eq!(voo.ticker, "VOO");
        assert_eq!(voo.unit_price, 400.0);
        assert!((voo.total_value - 4200.0).abs() < 1e-9);
        assert!((voo.total_value_local - 21000.0).abs() < 1e-9);
        assert_eq!(portfolio.assets[1].unit_price, 0.0);

        enricher.get_foreign_assets(1).await.unwrap();
        assert_eq!(fetcher.fx_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.foreign_calls.load(Ordering::SeqCst), 1);

        // Prices are refetched, the FX rate stays cached
        cache.invalidate_foreign().await;
        enricher.get_foreign_assets(1).await.unwrap();
        assert_eq!(fetcher.foreign_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.fx_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_fx_rate_fails_foreign_call() {
        let fetcher = Arc::new(MockFetcher::default());
        let repo = MockRepository::new(vec![holding("VOO", AssetClass::Foreign, 1.0)]);

        let err = enricher(repo, fetcher)
            .get_foreign_assets(1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EnrichmentError::FxRate(FetchError::MissingRate { .. })
        ));
    }
}
