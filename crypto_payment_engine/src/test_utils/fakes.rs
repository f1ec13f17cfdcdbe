//! In-memory stand-ins for the engine's external collaborators.
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cpg_common::Chain;
use rust_decimal::Decimal;

use crate::{
    db_types::{ChainTransaction, PaymentIntent},
    events::{EventHooks, PaymentConfirmedEvent},
    traits::{ChainQueryError, ChainWatcher, NotificationDispatcher, NotificationError, PriceOracle, PriceOracleError},
};

pub const MERCHANT_SOLANA_WALLET: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
pub const BUYER_SOLANA_WALLET: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";
pub const OTHER_SOLANA_WALLET: &str = "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T";
pub const MERCHANT_ETH_WALLET: &str = "0x52908400098527886E0F7030069857D2E4169EE7";
pub const BUYER_ETH_WALLET: &str = "0xde709f2102306220921060314715629080e2fb77";

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A price oracle with a settable price. Clones share state.
#[derive(Clone)]
pub struct FixedPriceOracle {
    price: Arc<Mutex<Result<Decimal, PriceOracleError>>>,
    calls: Arc<AtomicUsize>,
}

impl FixedPriceOracle {
    pub fn new(price: Decimal) -> Self {
        Self { price: Arc::new(Mutex::new(Ok(price))), calls: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn set_price(&self, price: Decimal) {
        *lock(&self.price) = Ok(price);
    }

    pub fn set_error(&self, error: PriceOracleError) {
        *lock(&self.price) = Err(error);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceOracle for FixedPriceOracle {
    async fn fetch_price(&self, _asset: &str) -> Result<Decimal, PriceOracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.price).clone()
    }
}

/// A chain watcher backed by a list of transactions that tests can change at will. Clones share state.
///
/// `find_matching` filters by recipient and `since` like a real watcher would, and fails while `failures_remaining`
/// is non-zero.
#[derive(Clone, Default)]
pub struct ScriptedChainWatcher {
    transactions: Arc<Mutex<Vec<ChainTransaction>>>,
    failures_remaining: Arc<AtomicUsize>,
    always_fail: Arc<Mutex<bool>>,
    succeed_every: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedChainWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_transaction(&self, tx: ChainTransaction) {
        lock(&self.transactions).push(tx);
    }

    /// Updates the confirmation count of the transaction with the given hash.
    pub fn set_confirmations(&self, hash: &str, confirmations: u64) {
        lock(&self.transactions).iter_mut().filter(|tx| tx.hash == hash).for_each(|tx| tx.confirmations = confirmations);
    }

    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    pub fn fail_always(&self, fail: bool) {
        *lock(&self.always_fail) = fail;
    }

    /// Only every `n`th call succeeds. Zero turns this off.
    pub fn succeed_every(&self, n: usize) {
        self.succeed_every.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainWatcher for ScriptedChainWatcher {
    async fn find_matching(
        &self,
        chain: Chain,
        recipient: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChainTransaction>, ChainQueryError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let scripted_failure =
            self.failures_remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok();
        let period = self.succeed_every.load(Ordering::SeqCst);
        let intermittent_failure = period > 0 && call % period != 0;
        if scripted_failure || intermittent_failure || *lock(&self.always_fail) {
            return Err(ChainQueryError::Unreachable { chain, reason: "scripted failure".into() });
        }
        let result = lock(&self.transactions)
            .iter()
            .filter(|tx| chain.same_address(&tx.to_address, recipient) && tx.observed_at >= since)
            .cloned()
            .collect();
        Ok(result)
    }
}

/// A notification dispatcher that records every payment it is asked to notify about.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<PaymentIntent>>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<PaymentIntent> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn send_confirmation(&self, payment: &PaymentIntent) -> Result<(), NotificationError> {
        lock(&self.sent).push(payment.clone());
        Ok(())
    }
}

/// A native SOL transfer observed now.
pub fn sol_transfer(hash: &str, from: &str, to: &str, amount: Decimal, confirmations: u64) -> ChainTransaction {
    ChainTransaction {
        hash: hash.to_string(),
        from_address: from.to_string(),
        to_address: to.to_string(),
        amount,
        asset: "SOL".to_string(),
        confirmations,
        observed_at: Utc::now(),
    }
}

impl RecordingNotifier {
    /// Hooks that forward every confirmed-payment event to this notifier.
    pub fn hooks(&self) -> EventHooks {
        let notifier = self.clone();
        let mut hooks = EventHooks::default();
        hooks.on_payment_confirmed(move |ev: PaymentConfirmedEvent| {
            let notifier = notifier.clone();
            Box::pin(async move {
                let _ = notifier.send_confirmation(&ev.payment).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        hooks
    }
}

/// Polls `condition` every few milliseconds until it holds or `timeout` elapses. Returns the final value.
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
