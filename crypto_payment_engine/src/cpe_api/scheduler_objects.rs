use std::time::Duration;

use cpg_common::Chain;
use serde::{Deserialize, Serialize};

use crate::db_types::{ChainTransaction, PaymentIntent};

/// The number of confirmations after which a transfer is considered settled, per chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationPolicy {
    pub solana: u64,
    pub ethereum: u64,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self { solana: 32, ethereum: 12 }
    }
}

impl ConfirmationPolicy {
    pub fn required(&self, chain: Chain) -> u64 {
        match chain {
            Chain::Solana => self.solana,
            Chain::Ethereum => self.ethereum,
        }
    }

    pub fn is_settled(&self, chain: Chain, tx: &ChainTransaction) -> bool {
        tx.is_settled(self.required(chain))
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    /// Polls without a qualifying transaction before the payment times out
    pub max_attempts: u32,
    /// Ceiling on the time between creation and confirmation
    pub timeout: Duration,
    /// Consecutive ticks that may fail on a dependency before the payment is failed
    pub error_budget: u32,
    /// Cap on the extra delay added after consecutive dependency failures
    pub max_error_backoff: Duration,
    pub confirmations: ConfirmationPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_attempts: 180,
            timeout: Duration::from_secs(30 * 60),
            error_budget: 30,
            max_error_backoff: Duration::from_secs(60),
            confirmations: ConfirmationPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    /// Extra delay before the next tick after `consecutive_errors` failed ticks in a row. Doubles from the poll
    /// interval, capped at `max_error_backoff`.
    pub fn error_backoff(&self, consecutive_errors: u32) -> Duration {
        if consecutive_errors == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(consecutive_errors.saturating_sub(1).min(16));
        self.poll_interval.saturating_mul(factor).min(self.max_error_backoff)
    }
}

/// What a verification pass found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Confirmed(PaymentIntent),
    Failed(PaymentIntent),
    /// No settled, matching transaction yet
    Pending(PaymentIntent),
}

impl VerificationOutcome {
    pub fn payment(&self) -> &PaymentIntent {
        match self {
            VerificationOutcome::Confirmed(p) | VerificationOutcome::Failed(p) | VerificationOutcome::Pending(p) => p,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, VerificationOutcome::Confirmed(_))
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, VerificationOutcome::Pending(_))
    }
}

impl From<PaymentIntent> for VerificationOutcome {
    fn from(payment: PaymentIntent) -> Self {
        use crate::db_types::PaymentStatus::*;
        match payment.status {
            Confirmed => VerificationOutcome::Confirmed(payment),
            Failed => VerificationOutcome::Failed(payment),
            Pending => VerificationOutcome::Pending(payment),
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn settlement_depends_on_chain() {
        let policy = ConfirmationPolicy::default();
        let tx = ChainTransaction {
            hash: "abc".into(),
            from_address: "a".into(),
            to_address: "b".into(),
            amount: dec!(1),
            asset: "SOL".into(),
            confirmations: 12,
            observed_at: Utc::now(),
        };
        assert!(policy.is_settled(Chain::Ethereum, &tx));
        assert!(!policy.is_settled(Chain::Solana, &tx));
    }

    #[test]
    fn error_backoff_is_capped() {
        let config = SchedulerConfig::default();
        assert_eq!(config.error_backoff(0), Duration::ZERO);
        assert_eq!(config.error_backoff(1), Duration::from_secs(10));
        assert_eq!(config.error_backoff(2), Duration::from_secs(20));
        assert_eq!(config.error_backoff(30), Duration::from_secs(60));
    }
}
