use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use crypto_payment_engine::{
    db_types::PaymentIntent,
    events::{EventHandlers, EventHooks, PaymentConfirmedEvent, PaymentFailedEvent},
    NotificationDispatcher,
    NotificationError,
};
use futures::future::BoxFuture;
use log::*;
use reqwest::Client;
use serde::Serialize;

use crate::{config::ServerConfig, data_objects::PaymentResponse, errors::ServerError};

pub const NOTIFICATION_EVENT_BUFFER_SIZE: usize = 25;
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationMessage {
    pub event: &'static str,
    pub buyer_email: String,
    pub payment: PaymentResponse,
}

impl From<&PaymentIntent> for ConfirmationMessage {
    fn from(payment: &PaymentIntent) -> Self {
        Self {
            event: "payment.confirmed",
            buyer_email: payment.buyer_email.clone(),
            payment: PaymentResponse::from(payment.clone()),
        }
    }
}

/// POSTs each confirmed payment, as JSON, to a merchant-supplied URL. The receiver owns delivery to the buyer.
#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| NotificationError::DeliveryFailed(e.to_string()))?;
        Ok(Self { url: url.to_string(), client })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookNotifier {
    async fn send_confirmation(&self, payment: &PaymentIntent) -> Result<(), NotificationError> {
        let message = ConfirmationMessage::from(payment);
        let response = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .map_err(|e| NotificationError::DeliveryFailed(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(NotificationError::Rejected { status, message })
        }
    }
}

/// Writes confirmations to the log. Used when no webhook is configured.
#[derive(Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationDispatcher for LogNotifier {
    async fn send_confirmation(&self, payment: &PaymentIntent) -> Result<(), NotificationError> {
        info!(
            "📬️ Payment {} for product #{} is confirmed. Buyer: {}. Transaction: {}",
            payment.id,
            payment.product_id,
            payment.buyer_email,
            payment.tx_hash.as_deref().unwrap_or_default()
        );
        Ok(())
    }
}

pub fn dispatcher_from_config(config: &ServerConfig) -> Result<Arc<dyn NotificationDispatcher>, ServerError> {
    match &config.notification_webhook_url {
        Some(url) => {
            info!("📬️ Payment confirmations will be sent to {url}");
            let notifier = WebhookNotifier::new(url).map_err(|e| ServerError::InitializeError(e.to_string()))?;
            Ok(Arc::new(notifier))
        },
        None => Ok(Arc::new(LogNotifier)),
    }
}

/// Event handlers that hand confirmed payments to `dispatcher` and log failed ones.
///
/// The engine publishes a confirmation event at most once per payment, so the dispatcher is never called twice for
/// the same payment. A delivery failure is logged and does not touch the payment's state.
pub fn create_notification_handlers(dispatcher: Arc<dyn NotificationDispatcher>) -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_payment_confirmed(move |ev: PaymentConfirmedEvent| {
        let dispatcher = Arc::clone(&dispatcher);
        let fut: BoxFuture<'static, ()> = Box::pin(async move {
            let id = ev.payment.id;
            match dispatcher.send_confirmation(&ev.payment).await {
                Ok(()) => debug!("📬️ Confirmation for payment {id} delivered"),
                Err(e) => error!("📬️ Could not deliver the confirmation for payment {id}. {e}"),
            }
        });
        fut
    });
    hooks.on_payment_failed(|ev: PaymentFailedEvent| {
        let fut: BoxFuture<'static, ()> = Box::pin(async move {
            let p = ev.payment;
            info!(
                "📬️ Payment {} for product #{} failed: {}",
                p.id,
                p.product_id,
                p.failure_reason.map(|r| r.to_string()).unwrap_or_default()
            );
        });
        fut
    });
    EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks)
}
