use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use crypto_payment_engine::{
    ChainWatcher,
    PaymentFlowApi,
    PaymentGatewayDatabase,
    PriceApi,
    PriceOracle,
    SqliteDatabase,
    VerificationScheduler,
};
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::{
        chain::{ExplorerChainWatcher, PriceFeedOracle},
        notifications::{create_notification_handlers, dispatcher_from_config},
    },
    routes::{
        health,
        json_config,
        AssetPriceRoute,
        CreatePaymentRoute,
        PaymentByIdRoute,
        PaymentsForProductRoute,
        ProductByIdRoute,
        SendConfirmationRoute,
        VerifyPaymentRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let dispatcher = dispatcher_from_config(&config)?;
    let handlers = create_notification_handlers(dispatcher);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let flow = PaymentFlowApi::new(db.clone(), producers).with_reconciler(config.reconciler());
    let prices = PriceApi::new(PriceFeedOracle::from_config(&config)?);
    let watcher = ExplorerChainWatcher::from_config(&config)?;
    let scheduler = VerificationScheduler::new(flow.clone(), watcher, config.scheduler.clone());
    if config.resume_pending {
        let resumed = scheduler.resume_pending().await?;
        info!("🚀️ Resumed verification of {resumed} pending payments");
    }
    let srv = create_server_instance(&config, flow, prices, scheduler.clone())?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    let stopped = scheduler.stop_all().await;
    info!("🚀️ Server stopped. {stopped} payment pollers were halted.");
    db.close().await;
    result
}

pub fn create_server_instance<B, O, W>(
    config: &ServerConfig,
    flow: PaymentFlowApi<B>,
    prices: PriceApi<O>,
    scheduler: VerificationScheduler<B, W>,
) -> Result<Server, ServerError>
where
    B: PaymentGatewayDatabase,
    O: PriceOracle + 'static,
    W: ChainWatcher + 'static,
{
    let flow = web::Data::new(flow);
    let prices = web::Data::new(prices);
    let scheduler = web::Data::new(scheduler);
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cpg::access_log"))
            .app_data(flow.clone())
            .app_data(prices.clone())
            .app_data(scheduler.clone())
            .configure(configure::<B, O, W>)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers every route. The app data (`PaymentFlowApi`, `PriceApi` and `VerificationScheduler`) must be supplied
/// by the caller.
pub fn configure<B, O, W>(cfg: &mut web::ServiceConfig)
where
    B: PaymentGatewayDatabase,
    O: PriceOracle + 'static,
    W: ChainWatcher + 'static,
{
    cfg.app_data(json_config())
        .service(health)
        .service(CreatePaymentRoute::<B, O, W>::new())
        .service(VerifyPaymentRoute::<B, W>::new())
        .service(SendConfirmationRoute::<B>::new())
        .service(PaymentsForProductRoute::<B>::new())
        .service(PaymentByIdRoute::<B>::new())
        .service(ProductByIdRoute::<B>::new())
        .service(AssetPriceRoute::<O>::new());
}
