use std::time::Duration;

use cpg_common::Secret;
use log::*;

pub const DEFAULT_PRICE_FEED_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_ETHERSCAN_URL: &str = "https://api.etherscan.io/api";
pub const DEFAULT_SOLANA_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn env_or_default(var: &str, default: &str) -> String {
    std::env::var(var).ok().filter(|s| !s.trim().is_empty()).unwrap_or_else(|| {
        info!("🪛️ {var} not set, using {default}");
        default.to_string()
    })
}

#[derive(Debug, Clone)]
pub struct PriceFeedConfig {
    pub base_url: String,
    pub api_key: Option<Secret<String>>,
    pub timeout: Duration,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_PRICE_FEED_URL.to_string(), api_key: None, timeout: DEFAULT_REQUEST_TIMEOUT }
    }
}

impl PriceFeedConfig {
    pub fn new(base_url: &str) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string(), ..Default::default() }
    }

    pub fn new_from_env_or_default() -> Self {
        let base_url = env_or_default("CPG_PRICE_FEED_URL", DEFAULT_PRICE_FEED_URL);
        let api_key = Secret::from_env("CPG_PRICE_FEED_API_KEY");
        if api_key.is_none() {
            info!("🪛️ CPG_PRICE_FEED_API_KEY not set. Price feed requests will be unauthenticated");
        }
        Self { api_key, ..Self::new(&base_url) }
    }
}

#[derive(Debug, Clone)]
pub struct EtherscanConfig {
    pub base_url: String,
    pub api_key: Option<Secret<String>>,
    pub timeout: Duration,
    /// Maximum number of transactions requested per query
    pub page_size: usize,
}

impl Default for EtherscanConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_ETHERSCAN_URL.to_string(), api_key: None, timeout: DEFAULT_REQUEST_TIMEOUT, page_size: 100 }
    }
}

impl EtherscanConfig {
    pub fn new(base_url: &str) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string(), ..Default::default() }
    }

    pub fn new_from_env_or_default() -> Self {
        let base_url = env_or_default("CPG_ETHERSCAN_URL", DEFAULT_ETHERSCAN_URL);
        let api_key = Secret::from_env("CPG_ETHERSCAN_API_KEY");
        if api_key.is_none() {
            warn!("🪛️ CPG_ETHERSCAN_API_KEY not set. Ethereum lookups will be heavily rate limited");
        }
        Self { api_key, ..Self::new(&base_url) }
    }
}

#[derive(Debug, Clone)]
pub struct SolanaRpcConfig {
    pub url: String,
    pub timeout: Duration,
    /// Maximum number of signatures fetched per query
    pub signature_limit: usize,
}

impl Default for SolanaRpcConfig {
    fn default() -> Self {
        Self { url: DEFAULT_SOLANA_RPC_URL.to_string(), timeout: DEFAULT_REQUEST_TIMEOUT, signature_limit: 25 }
    }
}

impl SolanaRpcConfig {
    pub fn new(url: &str) -> Self {
        Self { url: url.to_string(), ..Default::default() }
    }

    pub fn new_from_env_or_default() -> Self {
        Self::new(&env_or_default("CPG_SOLANA_RPC_URL", DEFAULT_SOLANA_RPC_URL))
    }
}
