pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::{Enricher, MarketCache};
use crate::providers::HttpMarketDataFetcher;
use crate::store::MemoryPortfolioRepository;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    Equities,
    Funds,
    Foreign,
    All,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions<'a> {
    pub config_path: Option<&'a str>,
    pub user_id: Option<i64>,
    pub json: bool,
}

/// Wires the cache, the repository and the upstream sources from a config.
pub fn build_enricher(config: &AppConfig) -> Result<Enricher> {
    let cache = Arc::new(MarketCache::new(config.market.cache_ttl()));
    let repository = Arc::new(MemoryPortfolioRepository::from_users(&config.users));
    let fetcher = Arc::new(HttpMarketDataFetcher::from_config(config)?);

    Ok(Enricher::new(repository, fetcher, cache)
        .with_columns(config.market.equity_columns, config.market.fund_columns)
        .with_max_concurrent_requests(config.market.max_concurrent_requests))
}

pub async fn run_command(command: AppCommand, options: RunOptions<'_>) -> Result<()> {
    info!("Carteira starting...");

    let config = match options.config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let user_id = match options.user_id {
        Some(id) => id,
        None => config
            .users
            .first()
            .map(|u| u.user_id)
            .context("No users configured")?,
    };

    let enricher = build_enricher(&config)?;
    let json = options.json;

    match command {
        AppCommand::Equities => cli::equities::run(&enricher, user_id, json).await,
        AppCommand::Funds => cli::funds::run(&enricher, user_id, json).await,
        AppCommand::Foreign => cli::foreign::run(&enricher, user_id, json).await,
        AppCommand::All => cli::all::run(&enricher, user_id, json).await,
    }
}
