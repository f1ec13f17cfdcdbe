use cucumber::World;
use crypto_payment_engine::{
    db_types::{PaymentIntent, Product},
    test_utils::{
        fakes::ScriptedChainWatcher,
        system::{fast_scheduler_config, TestSystem},
    },
    SchedulerConfig,
    SqliteDatabase,
    VerificationScheduler,
};
use rust_decimal::Decimal;

#[derive(Debug, Default, World)]
pub struct PaymentWorld {
    pub system: Option<TestSystem>,
    pub scheduler: Option<VerificationScheduler<SqliteDatabase, ScriptedChainWatcher>>,
    pub config: Option<SchedulerConfig>,
    pub product: Option<Product>,
    pub payment: Option<PaymentIntent>,
    pub last_tx_hash: Option<String>,
}

impl PaymentWorld {
    pub async fn init(&mut self, asset_price: Decimal) {
        if self.system.is_none() {
            self.system = Some(TestSystem::new(asset_price).await);
        }
    }

    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("Payment system not initialised")
    }

    pub fn product(&self) -> &Product {
        self.product.as_ref().expect("No product has been created")
    }

    pub fn payment(&self) -> &PaymentIntent {
        self.payment.as_ref().expect("No payment has been created")
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config.clone().unwrap_or_else(fast_scheduler_config)
    }

    pub fn scheduler(&mut self) -> &VerificationScheduler<SqliteDatabase, ScriptedChainWatcher> {
        if self.scheduler.is_none() {
            let scheduler = self.system().scheduler(self.config());
            self.scheduler = Some(scheduler);
        }
        self.scheduler.as_ref().expect("Scheduler not initialised")
    }
}
