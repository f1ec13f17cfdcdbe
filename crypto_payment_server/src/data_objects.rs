use chrono::{DateTime, Utc};
use cpg_common::Chain;
use crypto_payment_engine::{
    db_types::{FailureReason, PaymentId, PaymentIntent, PaymentStatus, Product, ProductId},
    AmountReconciler,
    PriceQuote,
    VerificationOutcome,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentParams {
    pub product_id: ProductId,
    pub buyer_email: String,
    pub buyer_wallet: String,
}

/// Body of the requests that act on a single payment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIdParams {
    pub payment_id: PaymentId,
}

/// What the buyer needs to make the transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    pub payment_id: PaymentId,
    pub chain: Chain,
    pub asset: String,
    pub recipient_wallet: String,
    pub expected_amount: Decimal,
    /// `expected_amount` rounded for display. Transfers are matched against the full-precision amount.
    pub display_amount: Decimal,
    pub price_quote: Decimal,
    pub price_usd: Decimal,
}

impl CreatePaymentResponse {
    pub fn new(payment: &PaymentIntent, reconciler: &AmountReconciler) -> Self {
        Self {
            payment_id: payment.id,
            chain: payment.chain,
            asset: payment.asset.clone(),
            recipient_wallet: payment.recipient_wallet.clone(),
            expected_amount: payment.expected_crypto_amount,
            display_amount: reconciler.display(payment.expected_crypto_amount),
            price_quote: payment.price_quote,
            price_usd: payment.price_usd,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
}

impl From<VerificationOutcome> for VerifyPaymentResponse {
    fn from(outcome: VerificationOutcome) -> Self {
        let success = outcome.is_confirmed();
        let payment = outcome.payment();
        Self {
            success,
            status: payment.status,
            tx_hash: payment.tx_hash.clone(),
            failure_reason: payment.failure_reason.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendConfirmationResponse {
    pub sent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub price_usd: Decimal,
    pub chain: Chain,
    pub currency: String,
    pub recipient_wallet: String,
    pub is_active: bool,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            price_usd: p.price_usd,
            chain: p.chain,
            currency: p.currency,
            recipient_wallet: p.recipient_wallet,
            is_active: p.is_active,
        }
    }
}

/// The public view of a payment intent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: PaymentId,
    pub product_id: ProductId,
    pub chain: Chain,
    pub asset: String,
    pub recipient_wallet: String,
    pub buyer_wallet: String,
    pub price_usd: Decimal,
    pub price_quote: Decimal,
    pub expected_amount: Decimal,
    pub status: PaymentStatus,
    pub failure_reason: Option<FailureReason>,
    pub tx_hash: Option<String>,
    pub attempt_count: i64,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl From<PaymentIntent> for PaymentResponse {
    fn from(p: PaymentIntent) -> Self {
        Self {
            id: p.id,
            product_id: p.product_id,
            chain: p.chain,
            asset: p.asset,
            recipient_wallet: p.recipient_wallet,
            buyer_wallet: p.buyer_wallet,
            price_usd: p.price_usd,
            price_quote: p.price_quote,
            expected_amount: p.expected_crypto_amount,
            status: p.status,
            failure_reason: p.failure_reason,
            tx_hash: p.tx_hash,
            attempt_count: p.attempt_count,
            created_at: p.created_at,
            confirmed_at: p.confirmed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    pub asset: String,
    pub usd_price: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl From<PriceQuote> for PriceResponse {
    fn from(q: PriceQuote) -> Self {
        Self { asset: q.asset, usd_price: q.usd_price, fetched_at: q.fetched_at }
    }
}
