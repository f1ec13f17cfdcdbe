use std::time::Duration;

use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use cpg_common::Chain;
use crypto_payment_engine::{
    db_types::{NewProduct, PaymentIntent, Product},
    events::EventHandlers,
    test_utils::{
        fakes::{RecordingNotifier, BUYER_SOLANA_WALLET, MERCHANT_SOLANA_WALLET},
        prepare_env::{drop_database, new_test_db},
        system::fast_retry_policy,
    },
    PaymentFlowApi,
    PaymentGatewayDatabase,
    PaymentRequest,
    PriceApi,
    ProductCatalog,
    SchedulerConfig,
    SqliteDatabase,
    VerificationScheduler,
};
use log::debug;
use rust_decimal::Decimal;
use serde_json::Value;

use super::mocks::{MockExplorer, MockPriceFeed};
use crate::server::configure;

/// The server's routes over a throwaway database, with mocked price feed and chain explorer.
pub struct TestServer {
    pub db: SqliteDatabase,
    pub notifier: RecordingNotifier,
    flow: web::Data<PaymentFlowApi<SqliteDatabase>>,
    prices: web::Data<PriceApi<MockPriceFeed>>,
    scheduler: web::Data<VerificationScheduler<SqliteDatabase, MockExplorer>>,
}

/// Background pollers tick once on start and then sleep for an hour, so tests drive verification explicitly.
fn test_scheduler_config() -> SchedulerConfig {
    SchedulerConfig { poll_interval: Duration::from_secs(3600), ..SchedulerConfig::default() }
}

impl TestServer {
    pub async fn new(oracle: MockPriceFeed, explorer: MockExplorer) -> Self {
        let db = new_test_db().await;
        let notifier = RecordingNotifier::default();
        let handlers = EventHandlers::new(16, notifier.hooks());
        let producers = handlers.producers();
        handlers.start_handlers().await;
        let flow = PaymentFlowApi::new(db.clone(), producers);
        let prices = PriceApi::new(oracle).with_policy(fast_retry_policy());
        let scheduler = VerificationScheduler::new(flow.clone(), explorer, test_scheduler_config());
        Self {
            db,
            notifier,
            flow: web::Data::new(flow),
            prices: web::Data::new(prices),
            scheduler: web::Data::new(scheduler),
        }
    }

    pub fn scheduler(&self) -> &VerificationScheduler<SqliteDatabase, MockExplorer> {
        self.scheduler.get_ref()
    }

    pub async fn add_product(&self, price_usd: Decimal, active: bool) -> Product {
        let mut product = NewProduct::new("Gadget", price_usd, Chain::Solana, MERCHANT_SOLANA_WALLET);
        if !active {
            product = product.inactive();
        }
        self.db.insert_product(product).await.expect("Error inserting product")
    }

    /// Creates a payment directly through the engine, without starting a poller.
    pub async fn add_payment(&self, product: &Product) -> PaymentIntent {
        let request = PaymentRequest {
            product_id: product.id,
            buyer_email: "buyer@example.com".into(),
            buyer_wallet: BUYER_SOLANA_WALLET.into(),
        };
        self.flow.create_payment(request, self.prices.get_ref()).await.expect("Error creating payment")
    }

    pub async fn payment(&self, payment: &PaymentIntent) -> PaymentIntent {
        self.db.fetch_payment(&payment.id).await.expect("Error fetching payment").expect("Payment is missing")
    }

    pub async fn get(&self, path: &str) -> (StatusCode, String) {
        self.call(TestRequest::get().uri(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, String) {
        self.call(TestRequest::post().uri(path).set_json(body)).await
    }

    pub async fn post_raw(&self, path: &str, body: &'static str) -> (StatusCode, String) {
        self.call(TestRequest::post().uri(path).insert_header(("content-type", "application/json")).set_payload(body))
            .await
    }

    async fn call(&self, req: TestRequest) -> (StatusCode, String) {
        let app = App::new()
            .app_data(self.flow.clone())
            .app_data(self.prices.clone())
            .app_data(self.scheduler.clone())
            .configure(configure::<SqliteDatabase, MockPriceFeed, MockExplorer>);
        let service = test::init_service(app).await;
        debug!("Making request");
        let res = test::call_service(&service, req.to_request()).await;
        let status = res.status();
        let body = res.into_body().try_into_bytes().map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default();
        (status, body)
    }

    pub async fn tear_down(self) {
        self.scheduler.stop_all().await;
        let url = self.db.url().to_string();
        self.db.close().await;
        drop_database(&url).await;
    }
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response is not JSON ({e}): {body}"))
}
