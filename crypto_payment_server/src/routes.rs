//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (I/O, database calls, chain
//! queries) must be awaited, never blocked on.
use actix_web::{error::JsonPayloadError, get, web, HttpRequest, HttpResponse, Responder};
use crypto_payment_engine::{
    db_types::{PaymentId, ProductId},
    ChainWatcher,
    PaymentFlowApi,
    PaymentGatewayDatabase,
    PaymentRequest,
    PriceApi,
    PriceOracle,
    VerificationScheduler,
};
use log::*;

use crate::{
    data_objects::{
        CreatePaymentParams,
        CreatePaymentResponse,
        PaymentIdParams,
        PaymentResponse,
        PriceResponse,
        ProductResponse,
        SendConfirmationResponse,
        VerifyPaymentResponse,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

/// Renders malformed JSON bodies as `{"error": ..}` with a 400 status, like every other error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
        debug!("💻️ Rejecting request body. {err}");
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}

fn parse_payment_id(s: &str) -> Result<PaymentId, ServerError> {
    s.parse::<PaymentId>().map_err(|e| ServerError::InvalidRequestPath(e.to_string()))
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(create_payment => Post "/payments/create" impl PaymentGatewayDatabase, PriceOracle, ChainWatcher);
/// Creates a payment intent for a product and starts watching the chain for the buyer's transfer.
///
/// The response carries everything the buyer needs to pay: chain, asset, recipient wallet and the expected amount,
/// which is fixed at the price quoted now.
pub async fn create_payment<B, O, W>(
    body: web::Json<CreatePaymentParams>,
    prices: web::Data<PriceApi<O>>,
    scheduler: web::Data<VerificationScheduler<B, W>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    O: PriceOracle,
    W: ChainWatcher + 'static,
{
    let CreatePaymentParams { product_id, buyer_email, buyer_wallet } = body.into_inner();
    debug!("💻️ Payment request for product #{product_id}");
    let flow = scheduler.flow();
    let request = PaymentRequest { product_id, buyer_email, buyer_wallet };
    let payment = flow.create_payment(request, prices.get_ref()).await?;
    scheduler.start(payment.id);
    Ok(HttpResponse::Ok().json(CreatePaymentResponse::new(&payment, flow.reconciler())))
}

route!(verify_payment => Post "/verify-payment" impl PaymentGatewayDatabase, ChainWatcher);
/// Checks the chain for the payment right now, outside the polling schedule.
///
/// `success` is true only once the payment is confirmed. A pending payment keeps being polled.
pub async fn verify_payment<B, W>(
    body: web::Json<PaymentIdParams>,
    scheduler: web::Data<VerificationScheduler<B, W>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    W: ChainWatcher + 'static,
{
    let id = body.into_inner().payment_id;
    debug!("💻️ Manual verification requested for payment {id}");
    let outcome = scheduler.verify_now(&id).await?;
    if outcome.is_terminal() {
        scheduler.stop(&id).await;
    }
    Ok(HttpResponse::Ok().json(VerifyPaymentResponse::from(outcome)))
}

route!(send_confirmation => Post "/send-confirmation" impl PaymentGatewayDatabase);
/// Sends the confirmation for a confirmed payment if it has not been sent yet. `sent` is false when there was
/// nothing to send.
pub async fn send_confirmation<B: PaymentGatewayDatabase>(
    body: web::Json<PaymentIdParams>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = body.into_inner().payment_id;
    let sent = api.send_confirmation(&id).await?;
    Ok(HttpResponse::Ok().json(SendConfirmationResponse { sent }))
}

route!(payment_by_id => Get "/payments/{id}" impl PaymentGatewayDatabase);
pub async fn payment_by_id<B: PaymentGatewayDatabase>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = parse_payment_id(&path.into_inner())?;
    let payment = api.fetch_payment(&id).await?;
    Ok(HttpResponse::Ok().json(PaymentResponse::from(payment)))
}

route!(payments_for_product => Get "/payments/product/{product_id}" impl PaymentGatewayDatabase);
pub async fn payments_for_product<B: PaymentGatewayDatabase>(
    path: web::Path<i64>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = ProductId(path.into_inner());
    let payments = api.fetch_payments_for_product(product_id).await?;
    let payments = payments.into_iter().map(PaymentResponse::from).collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(payments))
}

//----------------------------------------------   Products  ----------------------------------------------------
route!(product_by_id => Get "/products/{id}" impl PaymentGatewayDatabase);
/// Fetches a product that can be paid for. Inactive products are reported as missing.
pub async fn product_by_id<B: PaymentGatewayDatabase>(
    path: web::Path<i64>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product = api.fetch_active_product(ProductId(path.into_inner())).await?;
    Ok(HttpResponse::Ok().json(ProductResponse::from(product)))
}

//----------------------------------------------   Prices  ----------------------------------------------------
route!(asset_price => Get "/price/{asset}" impl PriceOracle);
pub async fn asset_price<O: PriceOracle>(
    path: web::Path<String>,
    prices: web::Data<PriceApi<O>>,
) -> Result<HttpResponse, ServerError> {
    let asset = path.into_inner().to_ascii_uppercase();
    let quote = prices.fetch_price(&asset).await?;
    Ok(HttpResponse::Ok().json(PriceResponse::from(quote)))
}
