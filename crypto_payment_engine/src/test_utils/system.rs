//! A fully wired engine over a throwaway SQLite database and in-memory collaborators.
use std::{fmt::Debug, time::Duration};

use cpg_common::Chain;
use rust_decimal::Decimal;

use crate::{
    db_types::{NewProduct, PaymentIntent, Product},
    events::EventHandlers,
    test_utils::{
        fakes::{FixedPriceOracle, RecordingNotifier, ScriptedChainWatcher, BUYER_SOLANA_WALLET, MERCHANT_SOLANA_WALLET},
        prepare_env::{drop_database, new_test_db},
    },
    PaymentFlowApi,
    PaymentGatewayDatabase,
    PaymentGatewayError,
    PaymentRequest,
    PriceApi,
    ProductCatalog,
    RetryPolicy,
    SchedulerConfig,
    SqliteDatabase,
    VerificationScheduler,
};

pub struct TestSystem {
    pub db: SqliteDatabase,
    pub flow: PaymentFlowApi<SqliteDatabase>,
    pub prices: PriceApi<FixedPriceOracle>,
    pub oracle: FixedPriceOracle,
    pub watcher: ScriptedChainWatcher,
    pub notifier: RecordingNotifier,
}

impl Debug for TestSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TestSystem ({})", self.db.url())
    }
}

/// Scheduler settings that keep tests fast: 10ms ticks, 5 attempts, an error budget of 3.
pub fn fast_scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        poll_interval: Duration::from_millis(10),
        max_attempts: 5,
        timeout: Duration::from_secs(60),
        error_budget: 3,
        max_error_backoff: Duration::from_millis(20),
        ..SchedulerConfig::default()
    }
}

pub fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
        request_timeout: Duration::from_millis(500),
    }
}

impl TestSystem {
    /// A new system with the asset price set to `asset_price` USD.
    pub async fn new(asset_price: Decimal) -> Self {
        let db = new_test_db().await;
        let notifier = RecordingNotifier::default();
        let handlers = EventHandlers::new(16, notifier.hooks());
        let producers = handlers.producers();
        handlers.start_handlers().await;
        let flow = PaymentFlowApi::new(db.clone(), producers);
        let oracle = FixedPriceOracle::new(asset_price);
        let prices = PriceApi::new(oracle.clone()).with_policy(fast_retry_policy());
        Self { db, flow, prices, oracle, watcher: ScriptedChainWatcher::new(), notifier }
    }

    pub fn scheduler(&self, config: SchedulerConfig) -> VerificationScheduler<SqliteDatabase, ScriptedChainWatcher> {
        VerificationScheduler::new(self.flow.clone(), self.watcher.clone(), config)
    }

    pub async fn add_product(&self, price_usd: Decimal, chain: Chain, recipient: &str) -> Product {
        let product = NewProduct::new("Test product", price_usd, chain, recipient);
        self.db.insert_product(product).await.expect("Error inserting product")
    }

    /// An active Solana product paid to the standard merchant wallet.
    pub async fn add_solana_product(&self, price_usd: Decimal) -> Product {
        self.add_product(price_usd, Chain::Solana, MERCHANT_SOLANA_WALLET).await
    }

    pub async fn create_payment(&self, product: &Product, buyer_wallet: &str) -> Result<PaymentIntent, PaymentGatewayError> {
        let request = PaymentRequest {
            product_id: product.id,
            buyer_email: "buyer@example.com".to_string(),
            buyer_wallet: buyer_wallet.to_string(),
        };
        self.flow.create_payment(request, &self.prices).await
    }

    pub async fn create_solana_payment(&self, product: &Product) -> PaymentIntent {
        self.create_payment(product, BUYER_SOLANA_WALLET).await.expect("Error creating payment")
    }

    pub async fn payment(&self, payment: &PaymentIntent) -> PaymentIntent {
        self.flow.fetch_payment(&payment.id).await.expect("Error fetching payment")
    }

    pub async fn tear_down(self) {
        let url = self.db.url().to_string();
        self.db.close().await;
        drop_database(&url).await;
    }
}
