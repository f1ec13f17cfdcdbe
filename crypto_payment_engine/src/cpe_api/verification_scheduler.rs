//! Server-side verification of pending payments.
//!
//! Each pending payment gets its own tokio task (a *poller*). On every tick the poller asks the [`ChainWatcher`] for
//! transfers to the payment's recipient, keeps the settled ones sent by the buyer for at least the expected amount
//! (within tolerance), and asks the [`PaymentFlowApi`] to confirm the payment with the first of them. A poller ends
//! when the payment reaches a terminal state, when it times out, or when it is stopped.
//!
//! Pollers hold no state that matters for correctness. Attempt counts live in the database, and every transition is
//! a compare-and-set, so pollers can be restarted (see [`VerificationScheduler::resume_pending`]) or run alongside
//! manual verification without double-confirming anything.
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
        Mutex,
        MutexGuard,
    },
};

use chrono::Utc;
use log::*;
use tokio::task::JoinHandle;

use crate::{
    cpe_api::{
        payment_flow_api::PaymentFlowApi,
        scheduler_objects::{SchedulerConfig, VerificationOutcome},
    },
    db_types::{ChainTransaction, FailureReason, PaymentId, PaymentIntent},
    traits::{ChainWatcher, PaymentGatewayDatabase, PaymentGatewayError},
};

struct PollerState {
    stopped: AtomicBool,
    /// Held for the duration of a tick. `stop` takes it to wait out an in-flight tick.
    tick_lock: tokio::sync::Mutex<()>,
}

struct Poller {
    state: Arc<PollerState>,
    handle: JoinHandle<()>,
}

impl Poller {
    /// Stops the poller. Once this returns, the poller will not start another tick.
    async fn halt(self) -> bool {
        let was_running = !self.handle.is_finished();
        self.state.stopped.store(true, Ordering::SeqCst);
        let guard = self.state.tick_lock.lock().await;
        self.handle.abort();
        drop(guard);
        let _ = self.handle.await;
        was_running
    }
}

pub struct VerificationScheduler<B, W> {
    flow: PaymentFlowApi<B>,
    watcher: Arc<W>,
    config: Arc<SchedulerConfig>,
    pollers: Arc<Mutex<HashMap<PaymentId, Poller>>>,
}

impl<B: Clone, W> Clone for VerificationScheduler<B, W> {
    fn clone(&self) -> Self {
        Self {
            flow: self.flow.clone(),
            watcher: Arc::clone(&self.watcher),
            config: Arc::clone(&self.config),
            pollers: Arc::clone(&self.pollers),
        }
    }
}

impl<B, W> Debug for VerificationScheduler<B, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VerificationScheduler ({:?})", self.config)
    }
}

impl<B, W> VerificationScheduler<B, W>
where
    B: PaymentGatewayDatabase,
    W: ChainWatcher + 'static,
{
    pub fn new(flow: PaymentFlowApi<B>, watcher: W, config: SchedulerConfig) -> Self {
        Self::with_shared_watcher(flow, Arc::new(watcher), config)
    }

    pub fn with_shared_watcher(flow: PaymentFlowApi<B>, watcher: Arc<W>, config: SchedulerConfig) -> Self {
        Self { flow, watcher, config: Arc::new(config), pollers: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn flow(&self) -> &PaymentFlowApi<B> {
        &self.flow
    }

    fn pollers(&self) -> MutexGuard<'_, HashMap<PaymentId, Poller>> {
        self.pollers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_polling(&self, id: &PaymentId) -> bool {
        self.pollers().get(id).map(|p| !p.handle.is_finished()).unwrap_or(false)
    }

    /// The number of pollers the scheduler is tracking. Pollers drop out once their payment settles or times out.
    pub fn active_pollers(&self) -> usize {
        self.pollers().len()
    }

    /// Starts polling for the payment. Returns `false` if a poller for it is already running.
    pub fn start(&self, id: PaymentId) -> bool {
        let mut pollers = self.pollers();
        if pollers.get(&id).map(|p| !p.handle.is_finished()).unwrap_or(false) {
            trace!("🔎️ Payment {id} is already being polled");
            return false;
        }
        let state = Arc::new(PollerState { stopped: AtomicBool::new(false), tick_lock: tokio::sync::Mutex::new(()) });
        let handle = tokio::spawn(self.clone().poll(id, Arc::clone(&state)));
        pollers.insert(id, Poller { state, handle });
        debug!("🔎️ Started polling for payment {id}");
        true
    }

    /// Stops polling for the payment. No tick for the payment runs after this returns. Returns `true` if a poller was
    /// running.
    pub async fn stop(&self, id: &PaymentId) -> bool {
        let poller = self.pollers().remove(id);
        match poller {
            Some(poller) => {
                let was_running = poller.halt().await;
                debug!("🔎️ Stopped polling for payment {id}");
                was_running
            },
            None => false,
        }
    }

    /// Stops every poller. Returns the number that were still running.
    pub async fn stop_all(&self) -> usize {
        let pollers = self.pollers().drain().map(|(_, p)| p).collect::<Vec<_>>();
        let mut stopped = 0;
        for poller in pollers {
            if poller.halt().await {
                stopped += 1;
            }
        }
        info!("🔎️ Stopped {stopped} payment pollers");
        stopped
    }

    /// Starts a poller for every payment that is still pending, e.g. after a restart. Attempt counts and deadlines
    /// carry over from the stored payment.
    pub async fn resume_pending(&self) -> Result<usize, PaymentGatewayError> {
        let pending = self.flow.db().fetch_pending_payments().await?;
        let total = pending.len();
        let started = pending.into_iter().filter(|p| self.start(p.id)).count();
        info!("🔎️ Resumed polling for {started} of {total} pending payments");
        Ok(started)
    }

    /// Checks the chain for the payment once, outside the polling schedule. Does not count as a poll attempt.
    ///
    /// If the payment has a poller, the check waits for any tick in flight and holds the next one off until it is done.
    pub async fn verify_now(&self, id: &PaymentId) -> Result<VerificationOutcome, PaymentGatewayError> {
        let poller = self.pollers().get(id).map(|p| Arc::clone(&p.state));
        // Runs between the poller's ticks, if the payment has one
        let _tick = match &poller {
            Some(state) => Some(state.tick_lock.lock().await),
            None => None,
        };
        let payment = self.flow.fetch_payment(id).await?;
        if payment.status.is_terminal() {
            return Ok(payment.into());
        }
        if let Some(outcome) = self.check_chain(&payment).await? {
            return Ok(outcome);
        }
        if self.deadline_passed(&payment) {
            return self.time_out(id).await;
        }
        Ok(VerificationOutcome::Pending(payment))
    }

    async fn poll(self, id: PaymentId, state: Arc<PollerState>) {
        let budget = self.config.error_budget;
        // The budget bounds every failed tick in the poller's life. The consecutive count only drives the backoff.
        let mut transient_failures = 0u32;
        let mut consecutive_errors = 0u32;
        loop {
            {
                let _tick = state.tick_lock.lock().await;
                if state.stopped.load(Ordering::SeqCst) {
                    break;
                }
                match self.tick(&id).await {
                    Ok(Some(outcome)) => {
                        info!("🔎️ Finished polling for payment {id}: {}", outcome.payment().status);
                        break;
                    },
                    Ok(None) => consecutive_errors = 0,
                    Err(e) if e.is_transient() => {
                        transient_failures += 1;
                        consecutive_errors += 1;
                        warn!("🔎️ Verification tick for payment {id} failed ({transient_failures}/{budget}). {e}");
                        if transient_failures >= budget {
                            error!("🔎️ Error budget for payment {id} is exhausted. Failing the payment.");
                            if let Err(e) = self.flow.request_fail(&id, FailureReason::TimedOut).await {
                                error!("🔎️ Could not fail payment {id}. It will be picked up on the next restart. {e}");
                            }
                            break;
                        }
                    },
                    Err(e) => {
                        error!("🔎️ Stopped polling for payment {id}. {e}");
                        break;
                    },
                }
            }
            let delay = self.config.poll_interval + self.config.error_backoff(consecutive_errors);
            tokio::time::sleep(delay).await;
        }
        self.forget(&id, &state);
    }

    /// Drops the poller's entry, unless `stop` or a newer poller for the same payment has already replaced it.
    fn forget(&self, id: &PaymentId, state: &Arc<PollerState>) {
        let mut pollers = self.pollers();
        if pollers.get(id).is_some_and(|p| Arc::ptr_eq(&p.state, state)) {
            pollers.remove(id);
        }
    }

    /// A single poll. Returns the terminal outcome once there is one.
    async fn tick(&self, id: &PaymentId) -> Result<Option<VerificationOutcome>, PaymentGatewayError> {
        let payment = self.flow.fetch_payment(id).await?;
        if payment.status.is_terminal() {
            return Ok(Some(payment.into()));
        }
        let max_attempts = i64::from(self.config.max_attempts);
        if payment.attempt_count >= max_attempts {
            return self.time_out(id).await.map(Some);
        }
        let found = match self.check_chain(&payment).await {
            Ok(found) => found,
            Err(e) if self.deadline_passed(&payment) => {
                warn!("🔎️ Chain check for payment {id} failed after its deadline. {e}");
                return self.time_out(id).await.map(Some);
            },
            Err(e) => return Err(e),
        };
        if let Some(outcome) = found {
            return Ok(Some(outcome));
        }
        if self.deadline_passed(&payment) {
            return self.time_out(id).await.map(Some);
        }
        match self.flow.db().record_poll_attempt(id).await? {
            Some(attempts) if attempts >= max_attempts => self.time_out(id).await.map(Some),
            Some(attempts) => {
                trace!("🔎️ No qualifying transaction for payment {id} after {attempts} attempts");
                Ok(None)
            },
            // Someone else moved the payment on while we were looking
            None => Ok(Some(self.flow.fetch_payment(id).await?.into())),
        }
    }

    async fn time_out(&self, id: &PaymentId) -> Result<VerificationOutcome, PaymentGatewayError> {
        let outcome = self.flow.request_fail(id, FailureReason::TimedOut).await?;
        Ok(outcome.into_payment().into())
    }

    fn deadline_passed(&self, payment: &PaymentIntent) -> bool {
        let elapsed = (Utc::now() - payment.created_at).to_std().unwrap_or_default();
        elapsed >= self.config.timeout
    }

    /// Queries the chain and tries to confirm the payment with each qualifying transaction in turn.
    async fn check_chain(&self, payment: &PaymentIntent) -> Result<Option<VerificationOutcome>, PaymentGatewayError> {
        let transactions =
            self.watcher.find_matching(payment.chain, &payment.recipient_wallet, payment.created_at).await?;
        trace!("⛓️ {} transfers to {} since {}", transactions.len(), payment.recipient_wallet, payment.created_at);
        for tx in self.qualifying(payment, transactions) {
            match self.flow.request_confirm(&payment.id, &tx.hash).await {
                Ok(outcome) => return Ok(Some(outcome.into_payment().into())),
                Err(PaymentGatewayError::TransactionAlreadyClaimed(hash)) => {
                    warn!("🔎️ Transaction {hash} already confirmed a different payment. Skipping it for {}", payment.id);
                },
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Settled transfers of the right asset from the buyer to the recipient, since the payment was created, for at
    /// least the expected amount (less tolerance). Earliest first.
    fn qualifying(&self, payment: &PaymentIntent, transactions: Vec<ChainTransaction>) -> Vec<ChainTransaction> {
        let chain = payment.chain;
        let required = self.config.confirmations.required(chain);
        let reconciler = self.flow.reconciler();
        let mut candidates = transactions
            .into_iter()
            .filter(|tx| {
                chain.same_address(&tx.from_address, &payment.buyer_wallet)
                    && chain.same_address(&tx.to_address, &payment.recipient_wallet)
                    && tx.asset.eq_ignore_ascii_case(&payment.asset)
                    // Block times only have second resolution
                    && tx.observed_at.timestamp() >= payment.created_at.timestamp()
            })
            .filter(|tx| {
                if !reconciler.matches(payment.expected_crypto_amount, tx.amount) {
                    debug!(
                        "🔎️ Transaction {} pays {} {}, short of the {} expected for payment {}",
                        tx.hash, tx.amount, tx.asset, payment.expected_crypto_amount, payment.id
                    );
                    return false;
                }
                if !tx.is_settled(required) {
                    debug!(
                        "🔎️ Transaction {} for payment {} has {} of {required} confirmations",
                        tx.hash, payment.id, tx.confirmations
                    );
                    return false;
                }
                true
            })
            .collect::<Vec<_>>();
        candidates.sort_by_key(|tx| tx.observed_at);
        candidates
    }
}
