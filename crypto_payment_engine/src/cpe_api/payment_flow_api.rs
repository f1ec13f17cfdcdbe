use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    cpe_api::{
        amount_reconciler::AmountReconciler,
        price_api::{PriceApi, PriceQuote},
    },
    db_types::{FailureReason, NewPaymentIntent, PaymentId, PaymentIntent, Product, ProductId},
    events::{EventProducers, PaymentConfirmedEvent, PaymentFailedEvent},
    helpers::{validate_email, validate_wallet_address, ValidationError},
    traits::{PaymentGatewayDatabase, PaymentGatewayError, PriceOracle, TransitionOutcome},
};

/// A buyer's request to pay for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub product_id: ProductId,
    pub buyer_email: String,
    pub buyer_wallet: String,
}

/// `PaymentFlowApi` is the authoritative state holder for payment intents.
///
/// Every state transition goes through here: `Pending` to `Confirmed` or `Failed`, and nothing out of a terminal
/// state. Transitions are compare-and-set operations in the backend, so concurrent callers (pollers, manual verify
/// requests, other processes) cannot both perform the same transition.
pub struct PaymentFlowApi<B> {
    db: B,
    producers: EventProducers,
    reconciler: AmountReconciler,
}

impl<B> Debug for PaymentFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B: Clone> Clone for PaymentFlowApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone(), reconciler: self.reconciler }
    }
}

impl<B> PaymentFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, reconciler: AmountReconciler::default() }
    }

    pub fn with_reconciler(mut self, reconciler: AmountReconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn reconciler(&self) -> &AmountReconciler {
        &self.reconciler
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> PaymentFlowApi<B>
where B: PaymentGatewayDatabase
{
    /// Creates a new `Pending` payment intent for the product in `request`.
    ///
    /// The product must exist, be active and carry a positive price, and the buyer's wallet must be a valid address
    /// on the product's chain. The asset price is fetched once, here, and the expected crypto amount derived from it
    /// is stored with the intent. Neither is ever recomputed.
    pub async fn create_payment<O: PriceOracle>(
        &self,
        request: PaymentRequest,
        prices: &PriceApi<O>,
    ) -> Result<PaymentIntent, PaymentGatewayError> {
        let product = self
            .db
            .fetch_product(request.product_id)
            .await?
            .ok_or(PaymentGatewayError::ProductNotFound(request.product_id))?;
        let PaymentRequest { buyer_email, buyer_wallet, .. } = request;
        let buyer_email = buyer_email.trim().to_string();
        let buyer_wallet = buyer_wallet.trim().to_string();
        validate_purchase(&product, &buyer_email, &buyer_wallet)?;
        let PriceQuote { usd_price, .. } = prices.fetch_price(&product.currency).await?;
        let expected = self
            .reconciler
            .quote(product.price_usd, usd_price)
            .map_err(|e| PaymentGatewayError::QuoteError(e.to_string()))?;
        let intent = NewPaymentIntent::for_product(&product, buyer_email, buyer_wallet, usd_price, expected);
        let payment = self.db.insert_payment(intent).await?;
        info!(
            "🔄️💰️ Payment {} created for product #{}: {} {} at ${usd_price}",
            payment.id,
            product.id,
            self.reconciler.display(expected),
            product.currency
        );
        Ok(payment)
    }

    /// Moves the payment to `Confirmed` with `tx_hash` as the matching transaction.
    ///
    /// Only the call that performs the transition triggers the confirmation notification. Repeated calls return
    /// [`TransitionOutcome::AlreadyApplied`] and notify no one. Confirming a failed payment is refused with
    /// [`TransitionOutcome::Conflict`].
    pub async fn request_confirm(
        &self,
        id: &PaymentId,
        tx_hash: &str,
    ) -> Result<TransitionOutcome, PaymentGatewayError> {
        let outcome = self.db.try_confirm_payment(id, tx_hash).await?;
        match &outcome {
            TransitionOutcome::Applied(_) => {
                debug!("🔄️✅️ Payment {id} confirmed by {tx_hash}");
                if let Err(e) = self.send_confirmation(id).await {
                    // The payment stays confirmed. The notification can be retried through `send_confirmation`.
                    error!("🔄️✅️ Payment {id} is confirmed, but the notification could not be sent. {e}");
                }
            },
            TransitionOutcome::AlreadyApplied(p) => {
                debug!("🔄️✅️ Payment {id} was already confirmed by {}", p.tx_hash.as_deref().unwrap_or_default());
            },
            TransitionOutcome::Conflict(p) => {
                warn!(
                    "🔄️🚨️ Transaction {tx_hash} matches payment {id}, but the payment has already failed ({}). The \
                     payment will not be reopened. Manual review may be needed.",
                    p.failure_reason.as_ref().map(|r| r.to_string()).unwrap_or_default()
                );
            },
        }
        Ok(outcome)
    }

    /// Moves the payment to `Failed`. Failing a failed payment is a no-op, and a confirmed payment is never failed.
    pub async fn request_fail(
        &self,
        id: &PaymentId,
        reason: FailureReason,
    ) -> Result<TransitionOutcome, PaymentGatewayError> {
        let outcome = self.db.try_fail_payment(id, &reason).await?;
        match &outcome {
            TransitionOutcome::Applied(p) => {
                debug!("🔄️❌️ Payment {id} failed: {reason}");
                self.producers.publish_payment_failed(PaymentFailedEvent::new(p.clone())).await;
            },
            TransitionOutcome::AlreadyApplied(_) => trace!("🔄️❌️ Payment {id} had already failed"),
            TransitionOutcome::Conflict(_) => {
                warn!("🔄️🚨️ Refusing to fail payment {id} ({reason}). It has already been confirmed.");
            },
        }
        Ok(outcome)
    }

    /// Hands the confirmation of a confirmed payment to the notification hooks, at most once per payment.
    ///
    /// Returns `true` if this call sent the notification, `false` if it had already been sent.
    pub async fn send_confirmation(&self, id: &PaymentId) -> Result<bool, PaymentGatewayError> {
        match self.db.claim_notification(id).await? {
            Some(payment) => {
                info!("🔄️📧️ Sending the confirmation for payment {id} to {}", payment.buyer_email);
                self.producers.publish_payment_confirmed(PaymentConfirmedEvent::new(payment)).await;
                Ok(true)
            },
            None => {
                // Distinguish an unknown id from a payment that is unconfirmed or already notified
                self.fetch_payment(id).await?;
                debug!("🔄️📧️ No confirmation sent for payment {id}. It is unconfirmed or was already notified.");
                Ok(false)
            },
        }
    }

    pub async fn fetch_payment(&self, id: &PaymentId) -> Result<PaymentIntent, PaymentGatewayError> {
        self.db.fetch_payment(id).await?.ok_or(PaymentGatewayError::PaymentNotFound(*id))
    }

    pub async fn fetch_payments_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<PaymentIntent>, PaymentGatewayError> {
        self.db.fetch_payments_for_product(product_id).await
    }

    /// Fetches a product that buyers can currently pay for. Missing and inactive products are both reported as not
    /// found.
    pub async fn fetch_active_product(&self, id: ProductId) -> Result<Product, PaymentGatewayError> {
        match self.db.fetch_product(id).await? {
            Some(product) if product.is_active => Ok(product),
            _ => Err(PaymentGatewayError::ProductNotFound(id)),
        }
    }
}

fn validate_purchase(product: &Product, buyer_email: &str, buyer_wallet: &str) -> Result<(), ValidationError> {
    if !product.is_active {
        return Err(ValidationError::ProductInactive(product.id));
    }
    if product.price_usd <= rust_decimal::Decimal::ZERO {
        return Err(ValidationError::InvalidProductPrice(product.id));
    }
    validate_wallet_address(product.chain, buyer_wallet)?;
    validate_email(buyer_email)
}
