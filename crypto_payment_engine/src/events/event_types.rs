use serde::{Deserialize, Serialize};

use crate::db_types::PaymentIntent;

/// Published once per payment, after it is confirmed and the notification claim succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmedEvent {
    pub payment: PaymentIntent,
}

impl PaymentConfirmedEvent {
    pub fn new(payment: PaymentIntent) -> Self {
        Self { payment }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub payment: PaymentIntent,
}

impl PaymentFailedEvent {
    pub fn new(payment: PaymentIntent) -> Self {
        Self { payment }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    PaymentConfirmed(PaymentConfirmedEvent),
    PaymentFailed(PaymentFailedEvent),
}
