use std::{fmt::Debug, time::Duration};

use chrono::{DateTime, Utc};
use log::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::traits::{PriceOracle, PriceOracleError};

/// A USD price for one unit of an asset, and when it was fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub asset: String,
    pub usd_price: Decimal,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of calls to the oracle, including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound on each individual call
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(4),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// The delay before retry number `attempt` (1-based), doubling each time up to `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// `PriceApi` puts a bounded timeout and retries with exponential backoff around a [`PriceOracle`].
///
/// Only transient oracle errors are retried. A price that is not strictly positive is never accepted.
pub struct PriceApi<O> {
    oracle: O,
    policy: RetryPolicy,
}

impl<O> Debug for PriceApi<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PriceApi ({:?})", self.policy)
    }
}

impl<O: PriceOracle> PriceApi<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle, policy: RetryPolicy::default() }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub async fn fetch_price(&self, asset: &str) -> Result<PriceQuote, PriceOracleError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.policy.request_timeout, self.oracle.fetch_price(asset)).await {
                Ok(result) => result,
                Err(_) => Err(PriceOracleError::Timeout),
            };
            let error = match result {
                Ok(price) if price > Decimal::ZERO => {
                    trace!("💱️ {asset} is worth ${price}");
                    return Ok(PriceQuote { asset: asset.to_string(), usd_price: price, fetched_at: Utc::now() });
                },
                Ok(price) => {
                    warn!("💱️ The price feed quoted {asset} at ${price}. Refusing to use it.");
                    return Err(PriceOracleError::NonPositivePrice { asset: asset.to_string(), price });
                },
                Err(e) if !e.is_transient() => {
                    warn!("💱️ Could not fetch the price of {asset}: {e}");
                    return Err(e);
                },
                Err(e) => e,
            };
            if attempt >= max_attempts {
                warn!("💱️ Giving up on the price of {asset} after {attempt} attempts. {error}");
                return Err(PriceOracleError::PriceUnavailable {
                    asset: asset.to_string(),
                    attempts: attempt,
                    reason: error.to_string(),
                });
            }
            let delay = self.policy.backoff(attempt);
            debug!("💱️ Price request for {asset} failed ({error}). Retrying in {}ms", delay.as_millis());
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Mutex,
    };

    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    use super::*;

    struct ScriptedOracle {
        calls: AtomicU32,
        script: Mutex<Vec<Result<Decimal, PriceOracleError>>>,
    }

    impl ScriptedOracle {
        fn new(mut script: Vec<Result<Decimal, PriceOracleError>>) -> Self {
            script.reverse();
            Self { calls: AtomicU32::new(0), script: Mutex::new(script) }
        }
    }

    #[async_trait]
    impl PriceOracle for ScriptedOracle {
        async fn fetch_price(&self, _asset: &str) -> Result<Decimal, PriceOracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script.lock().unwrap().pop().unwrap_or(Err(PriceOracleError::Transport("script exhausted".into())))
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            request_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let oracle = ScriptedOracle::new(vec![Err(PriceOracleError::Timeout), Ok(dec!(20))]);
        let api = PriceApi::new(oracle).with_policy(fast_policy());
        let quote = api.fetch_price("SOL").await.unwrap();
        assert_eq!(quote.usd_price, dec!(20));
        assert_eq!(quote.asset, "SOL");
        assert_eq!(api.oracle().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let oracle = ScriptedOracle::new(vec![
            Err(PriceOracleError::RateLimited),
            Err(PriceOracleError::Transport("connection reset".into())),
            Err(PriceOracleError::Timeout),
            Ok(dec!(20)),
        ]);
        let api = PriceApi::new(oracle).with_policy(fast_policy());
        let err = api.fetch_price("ETH").await.unwrap_err();
        assert!(matches!(err, PriceOracleError::PriceUnavailable { attempts: 3, .. }));
        assert_eq!(api.oracle().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let oracle = ScriptedOracle::new(vec![Err(PriceOracleError::UnsupportedAsset("DOGE".into())), Ok(dec!(1))]);
        let api = PriceApi::new(oracle).with_policy(fast_policy());
        let err = api.fetch_price("DOGE").await.unwrap_err();
        assert!(matches!(err, PriceOracleError::UnsupportedAsset(_)));
        assert_eq!(api.oracle().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_positive_prices_are_refused() {
        let api = PriceApi::new(ScriptedOracle::new(vec![Ok(dec!(0))])).with_policy(fast_policy());
        assert!(matches!(api.fetch_price("SOL").await, Err(PriceOracleError::NonPositivePrice { .. })));
        let api = PriceApi::new(ScriptedOracle::new(vec![Ok(dec!(-1.5))])).with_policy(fast_policy());
        assert!(matches!(api.fetch_price("SOL").await, Err(PriceOracleError::NonPositivePrice { .. })));
    }

    #[tokio::test]
    async fn slow_oracles_time_out() {
        struct SlowOracle;
        #[async_trait]
        impl PriceOracle for SlowOracle {
            async fn fetch_price(&self, _asset: &str) -> Result<Decimal, PriceOracleError> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(dec!(20))
            }
        }
        let policy = RetryPolicy { request_timeout: Duration::from_millis(10), ..fast_policy() };
        let api = PriceApi::new(SlowOracle).with_policy(policy);
        let err = api.fetch_price("SOL").await.unwrap_err();
        assert!(matches!(err, PriceOracleError::PriceUnavailable { attempts: 3, .. }));
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(250));
        assert_eq!(policy.backoff(2), Duration::from_millis(500));
        assert_eq!(policy.backoff(3), Duration::from_secs(1));
        assert_eq!(policy.backoff(10), Duration::from_secs(4));
    }
}
