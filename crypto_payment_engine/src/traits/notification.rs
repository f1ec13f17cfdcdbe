use async_trait::async_trait;
use thiserror::Error;

use crate::db_types::PaymentIntent;

#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("Could not deliver the notification: {0}")]
    DeliveryFailed(String),
    #[error("The notification channel rejected the message with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// The outbound channel telling a buyer their payment was confirmed.
///
/// The engine calls this at most once per payment. Delivery failures are logged and never alter payment state.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_confirmation(&self, payment: &PaymentIntent) -> Result<(), NotificationError>;
}
