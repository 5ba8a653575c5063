use crate::core::cache::DEFAULT_TTL;
use crate::core::enrichment::DEFAULT_MAX_CONCURRENT_REQUESTS;
use crate::core::market::{EquityColumns, FundColumns};
use crate::core::portfolio::Holding;
use crate::providers::statusinvest::FundamentalsPaths;
use crate::providers::util::DEFAULT_TIMEOUT;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UserPortfolio {
    pub user_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub holdings: Vec<Holding>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    pub fundamentus: Option<ProviderConfig>,
    pub statusinvest: Option<ProviderConfig>,
    pub frankfurter: Option<ProviderConfig>,
    pub yahoo: Option<ProviderConfig>,
}

impl ProvidersConfig {
    pub fn fundamentus_url(&self) -> &str {
        self.fundamentus
            .as_ref()
            .map_or("https://www.fundamentus.com.br", |p| &p.base_url)
    }

    pub fn statusinvest_url(&self) -> &str {
        self.statusinvest
            .as_ref()
            .map_or("https://statusinvest.com.br", |p| &p.base_url)
    }

    pub fn frankfurter_url(&self) -> &str {
        self.frankfurter
            .as_ref()
            .map_or("https://api.frankfurter.app", |p| &p.base_url)
    }

    pub fn yahoo_url(&self) -> &str {
        self.yahoo
            .as_ref()
            .map_or("https://query1.finance.yahoo.com", |p| &p.base_url)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FxConfig {
    pub from: String,
    pub to: String,
}

impl Default for FxConfig {
    fn default() -> Self {
        FxConfig {
            from: "USD".to_string(),
            to: "BRL".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MarketConfig {
    pub cache_ttl_secs: u64,
    pub max_concurrent_requests: usize,
    pub request_timeout_secs: u64,
    pub equity_columns: EquityColumns,
    pub fund_columns: FundColumns,
    pub fundamentals: FundamentalsPaths,
}

impl MarketConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        MarketConfig {
            cache_ttl_secs: DEFAULT_TTL.as_secs(),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            request_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            equity_columns: EquityColumns::default(),
            fund_columns: FundColumns::default(),
            fundamentals: FundamentalsPaths::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub users: Vec<UserPortfolio>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub fx: FxConfig,
    #[serde(default)]
    pub market: MarketConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("br", "carteira", "carteira")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
