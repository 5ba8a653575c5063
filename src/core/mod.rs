//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod holdings;
pub mod log;
pub mod market;
pub mod parse;
pub mod portfolio;
pub mod valuation;

// Re-export main types for cleaner imports
pub use cache::{MarketCache, TtlCache};
pub use enrichment::{
    EnrichedEquity, EnrichedForeignAsset, EnrichedFund, Enricher, ForeignPortfolio,
    PortfolioOverview,
};
pub use error::{EnrichmentError, FetchError, RepositoryError};
pub use holdings::HoldingsService;
pub use market::{
    AssetClass, Fundamentals, FxRate, MarketDataFetcher, MarketSnapshot, MarketTable,
};
pub use portfolio::{Holding, PortfolioRepository, PortfolioWriter};
