use async_trait::async_trait;
use thiserror::Error;

use crate::{
    db_types::{ConversionError, FailureReason, NewPaymentIntent, PaymentId, PaymentIntent, ProductId},
    helpers::ValidationError,
    traits::{ChainQueryError, PriceOracleError, ProductCatalog, TransitionOutcome},
};

/// This trait defines the storage behaviour of the payment engine.
///
/// Every state transition is a compare-and-set against the persisted status, so the guarantees hold for any number of
/// concurrent callers, in this process or another one:
/// * a payment leaves `Pending` at most once, and never leaves a terminal state;
/// * a transaction hash confirms at most one payment;
/// * the confirmation notification is claimed at most once.
#[async_trait]
pub trait PaymentGatewayDatabase: ProductCatalog + Clone + Send + Sync + 'static {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new payment intent in the `Pending` state.
    async fn insert_payment(&self, payment: NewPaymentIntent) -> Result<PaymentIntent, PaymentGatewayError>;

    async fn fetch_payment(&self, id: &PaymentId) -> Result<Option<PaymentIntent>, PaymentGatewayError>;

    async fn fetch_payments_for_product(&self, product_id: ProductId)
        -> Result<Vec<PaymentIntent>, PaymentGatewayError>;

    /// All payments still in the `Pending` state, oldest first.
    async fn fetch_pending_payments(&self) -> Result<Vec<PaymentIntent>, PaymentGatewayError>;

    async fn fetch_payment_by_tx_hash(&self, tx_hash: &str) -> Result<Option<PaymentIntent>, PaymentGatewayError>;

    /// Moves the payment from `Pending` to `Confirmed`, recording `tx_hash` and the confirmation time.
    ///
    /// Returns [`PaymentGatewayError::TransactionAlreadyClaimed`] if another payment was confirmed with the same hash.
    async fn try_confirm_payment(
        &self,
        id: &PaymentId,
        tx_hash: &str,
    ) -> Result<TransitionOutcome, PaymentGatewayError>;

    /// Moves the payment from `Pending` to `Failed` with the given reason.
    async fn try_fail_payment(
        &self,
        id: &PaymentId,
        reason: &FailureReason,
    ) -> Result<TransitionOutcome, PaymentGatewayError>;

    /// Marks a confirmed payment as notified. Returns the payment only to the first caller; every other call, and any
    /// call for a payment that is not confirmed, returns `None`.
    async fn claim_notification(&self, id: &PaymentId) -> Result<Option<PaymentIntent>, PaymentGatewayError>;

    /// Increments the poll counter of a pending payment and stamps `last_polled_at`. Returns the new count, or `None`
    /// if the payment is no longer pending.
    async fn record_poll_attempt(&self, id: &PaymentId) -> Result<Option<i64>, PaymentGatewayError>;
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine error. {0}")]
    DatabaseError(String),
    #[error("A stored record could not be read. {0}")]
    CorruptRecord(String),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(PaymentId),
    #[error("Product {0} does not exist")]
    ProductNotFound(ProductId),
    #[error("Product {0} is referenced by payments and cannot be changed")]
    ProductInUse(ProductId),
    #[error("Transaction {0} has already been used to confirm another payment")]
    TransactionAlreadyClaimed(String),
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    PriceUnavailable(#[from] PriceOracleError),
    #[error("{0}")]
    ChainQuery(#[from] ChainQueryError),
    #[error("Could not quote the payment amount. {0}")]
    QuoteError(String),
}

impl PaymentGatewayError {
    /// Errors caused by a dependency being unavailable, which may clear up on their own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DatabaseError(_) | Self::PriceUnavailable(_) | Self::ChainQuery(_))
    }
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}

impl From<ConversionError> for PaymentGatewayError {
    fn from(e: ConversionError) -> Self {
        PaymentGatewayError::CorruptRecord(e.to_string())
    }
}
