use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use cpg_common::Chain;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error)]
#[error("Could not convert value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------     PaymentId       ---------------------------------------------------------
/// The unique identifier of a payment intent. Generated when the intent is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PaymentId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self).map_err(|e| ConversionError(format!("Invalid payment id {s}: {e}")))
    }
}

//--------------------------------------     ProductId       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct ProductId(pub i64);

impl Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ProductId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

//--------------------------------------      Product        ---------------------------------------------------------
/// A merchant product with a fixed USD price, payable in the native asset of a single chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price_usd: Decimal,
    pub chain: Chain,
    /// The asset symbol buyers pay with, e.g. `SOL`
    pub currency: String,
    /// The merchant address that receives payments for this product
    pub recipient_wallet: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price_usd: Decimal,
    pub chain: Chain,
    pub currency: String,
    pub recipient_wallet: String,
    pub is_active: bool,
}

impl NewProduct {
    /// Creates an active product priced in the chain's native asset.
    pub fn new<S: Into<String>>(name: S, price_usd: Decimal, chain: Chain, recipient_wallet: S) -> Self {
        Self {
            name: name.into(),
            price_usd,
            chain,
            currency: chain.native_asset().to_string(),
            recipient_wallet: recipient_wallet.into(),
            is_active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

//--------------------------------------   PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// The payment intent has been created and is waiting for a matching on-chain transaction.
    Pending,
    /// A settled transaction matching the intent was found. Terminal.
    Confirmed,
    /// No matching transaction arrived in time, or the payment was rejected. Terminal.
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Confirmed => write!(f, "Confirmed"),
            PaymentStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Confirmed" => Ok(Self::Confirmed),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------   FailureReason     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// No qualifying transaction was observed before the attempt cap or the time ceiling was reached.
    TimedOut,
    Rejected(String),
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::TimedOut => write!(f, "TimedOut"),
            FailureReason::Rejected(reason) => write!(f, "Rejected: {reason}"),
        }
    }
}

impl FromStr for FailureReason {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TimedOut" => Ok(Self::TimedOut),
            s => match s.strip_prefix("Rejected:") {
                Some(reason) => Ok(Self::Rejected(reason.trim().to_string())),
                None => Err(ConversionError(format!("Invalid failure reason: {s}"))),
            },
        }
    }
}

impl Serialize for FailureReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FailureReason {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

//--------------------------------------   PaymentIntent     ---------------------------------------------------------
/// A buyer's intent to pay for a product, together with the crypto amount they were quoted.
///
/// `price_quote` and `expected_crypto_amount` are fixed when the intent is created. Chain, asset and recipient are
/// copied from the product at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: PaymentId,
    pub product_id: ProductId,
    pub chain: Chain,
    pub asset: String,
    pub recipient_wallet: String,
    pub buyer_email: String,
    pub buyer_wallet: String,
    pub price_usd: Decimal,
    /// USD price of one unit of `asset` when the intent was created
    pub price_quote: Decimal,
    pub expected_crypto_amount: Decimal,
    pub status: PaymentStatus,
    pub failure_reason: Option<FailureReason>,
    pub tx_hash: Option<String>,
    pub attempt_count: i64,
    pub last_polled_at: Option<DateTime<Utc>>,
    pub notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub id: PaymentId,
    pub product_id: ProductId,
    pub chain: Chain,
    pub asset: String,
    pub recipient_wallet: String,
    pub buyer_email: String,
    pub buyer_wallet: String,
    pub price_usd: Decimal,
    pub price_quote: Decimal,
    pub expected_crypto_amount: Decimal,
}

impl NewPaymentIntent {
    /// Builds a new intent for `product` with a freshly generated id.
    pub fn for_product<S: Into<String>>(
        product: &Product,
        buyer_email: S,
        buyer_wallet: S,
        price_quote: Decimal,
        expected_crypto_amount: Decimal,
    ) -> Self {
        Self {
            id: PaymentId::random(),
            product_id: product.id,
            chain: product.chain,
            asset: product.currency.clone(),
            recipient_wallet: product.recipient_wallet.clone(),
            buyer_email: buyer_email.into(),
            buyer_wallet: buyer_wallet.into(),
            price_usd: product.price_usd,
            price_quote,
            expected_crypto_amount,
        }
    }
}

//--------------------------------------  ChainTransaction   ---------------------------------------------------------
/// A native-asset transfer observed on chain. These are never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTransaction {
    pub hash: String,
    pub from_address: String,
    pub to_address: String,
    pub amount: Decimal,
    pub asset: String,
    pub confirmations: u64,
    pub observed_at: DateTime<Utc>,
}

impl ChainTransaction {
    pub fn is_settled(&self, required_confirmations: u64) -> bool {
        self.confirmations >= required_confirmations
    }
}
