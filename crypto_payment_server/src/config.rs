use std::{env, fmt::Display, str::FromStr, time::Duration};

use chain_tools::{EtherscanConfig, PriceFeedConfig, SolanaRpcConfig};
use cpg_common::helpers::{parse_boolean_flag, parse_env};
use crypto_payment_engine::{AmountReconciler, ConfirmationPolicy, SchedulerConfig};
use log::*;
use rust_decimal::Decimal;

const DEFAULT_CPG_HOST: &str = "127.0.0.1";
const DEFAULT_CPG_PORT: u16 = 8360;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/cpg_store.db";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Polling schedule, attempt cap, time ceiling, error budget and confirmation depths
    pub scheduler: SchedulerConfig,
    /// Fraction below the expected amount that is still accepted as payment
    pub amount_tolerance: Decimal,
    pub price_feed: PriceFeedConfig,
    pub etherscan: EtherscanConfig,
    pub solana_rpc: SolanaRpcConfig,
    /// Confirmed payments are POSTed here. When `None`, confirmations are only logged.
    pub notification_webhook_url: Option<String>,
    /// Resume polling for every pending payment at start-up
    pub resume_pending: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CPG_HOST.to_string(),
            port: DEFAULT_CPG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            scheduler: SchedulerConfig::default(),
            amount_tolerance: AmountReconciler::default().tolerance(),
            price_feed: PriceFeedConfig::default(),
            etherscan: EtherscanConfig::default(),
            solana_rpc: SolanaRpcConfig::default(),
            notification_webhook_url: None,
            resume_pending: true,
        }
    }
}

/// Reads `name` from the environment, falling back to `default` when it is missing or malformed.
fn env_or<T: FromStr + Display>(name: &str, default: T) -> T
where T::Err: Display {
    match parse_env::<T>(name) {
        Ok(Some(v)) => v,
        Ok(None) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
        Err(e) => {
            error!("🪛️ {e}. Using the default, {default}, instead.");
            default
        },
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let host = env::var("CPG_HOST").ok().unwrap_or_else(|| DEFAULT_CPG_HOST.into());
        let port = env_or("CPG_PORT", DEFAULT_CPG_PORT);
        let database_url = env::var("CPG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ CPG_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.to_string()
        });
        let scheduler = scheduler_config_from_env(&defaults.scheduler);
        let amount_tolerance = tolerance_from_env(defaults.amount_tolerance);
        let notification_webhook_url =
            env::var("CPG_NOTIFICATION_WEBHOOK_URL").ok().filter(|s| !s.trim().is_empty()).or_else(|| {
                info!("🪛️ CPG_NOTIFICATION_WEBHOOK_URL is not set. Payment confirmations will only be logged.");
                None
            });
        let resume_pending = parse_boolean_flag(env::var("CPG_RESUME_PENDING").ok(), true);
        Self {
            host,
            port,
            database_url,
            scheduler,
            amount_tolerance,
            price_feed: PriceFeedConfig::new_from_env_or_default(),
            etherscan: EtherscanConfig::new_from_env_or_default(),
            solana_rpc: SolanaRpcConfig::new_from_env_or_default(),
            notification_webhook_url,
            resume_pending,
        }
    }

    /// The reconciler for the configured tolerance. An out-of-range tolerance has already been replaced by the
    /// default when the configuration was loaded.
    pub fn reconciler(&self) -> AmountReconciler {
        AmountReconciler::new(self.amount_tolerance, AmountReconciler::default().display_precision())
            .unwrap_or_default()
    }
}

fn scheduler_config_from_env(defaults: &SchedulerConfig) -> SchedulerConfig {
    let poll_interval = env_or("CPG_POLL_INTERVAL_SECS", defaults.poll_interval.as_secs());
    let poll_interval = if poll_interval == 0 {
        warn!("🪛️ CPG_POLL_INTERVAL_SECS must be at least 1. Using 1 second.");
        1
    } else {
        poll_interval
    };
    let max_attempts = env_or("CPG_MAX_POLL_ATTEMPTS", defaults.max_attempts);
    let timeout_mins = env_or("CPG_VERIFICATION_TIMEOUT_MINS", defaults.timeout.as_secs() / 60);
    let error_budget = env_or("CPG_ERROR_BUDGET", defaults.error_budget);
    let confirmations = ConfirmationPolicy {
        solana: env_or("CPG_SOLANA_CONFIRMATIONS", defaults.confirmations.solana),
        ethereum: env_or("CPG_ETHEREUM_CONFIRMATIONS", defaults.confirmations.ethereum),
    };
    info!(
        "🪛️ Payments are polled every {poll_interval}s, at most {max_attempts} times and for at most {timeout_mins} \
         minutes"
    );
    SchedulerConfig {
        poll_interval: Duration::from_secs(poll_interval),
        max_attempts,
        timeout: Duration::from_secs(timeout_mins.saturating_mul(60)),
        error_budget,
        confirmations,
        ..defaults.clone()
    }
}

fn tolerance_from_env(default: Decimal) -> Decimal {
    let tolerance = env_or("CPG_AMOUNT_TOLERANCE", default);
    if tolerance < Decimal::ZERO || tolerance >= Decimal::ONE {
        error!("🪛️ CPG_AMOUNT_TOLERANCE must lie in [0, 1), got {tolerance}. Using the default, {default}, instead.");
        return default;
    }
    tolerance
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8360);
        assert_eq!(config.scheduler.poll_interval, Duration::from_secs(10));
        assert_eq!(config.scheduler.max_attempts, 180);
        assert_eq!(config.scheduler.timeout, Duration::from_secs(1800));
        assert_eq!(config.amount_tolerance, dec!(0.01));
        assert!(config.resume_pending);
        assert!(config.notification_webhook_url.is_none());
        assert_eq!(config.reconciler().tolerance(), dec!(0.01));
    }

    #[test]
    fn env_values() {
        env::set_var("CPG_TEST_GOOD_PORT", "9000");
        env::set_var("CPG_TEST_BAD_PORT", "ninety");
        assert_eq!(env_or("CPG_TEST_GOOD_PORT", 8360u16), 9000);
        assert_eq!(env_or("CPG_TEST_BAD_PORT", 8360u16), 8360);
        assert_eq!(env_or("CPG_TEST_MISSING_PORT", 8360u16), 8360);
    }
}
