//! `SqliteDatabase` is a concrete implementation of a crypto payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use async_trait::async_trait;
use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{db_url, new_pool, payments, products};
use crate::{
    db_types::{
        FailureReason,
        NewPaymentIntent,
        NewProduct,
        PaymentId,
        PaymentIntent,
        PaymentStatus,
        Product,
        ProductId,
    },
    traits::{PaymentGatewayDatabase, PaymentGatewayError, ProductCatalog, TransitionOutcome},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

/// Classifies the payment after a conditional transition into `target`.
fn outcome_for(
    updated: bool,
    target: PaymentStatus,
    payment: PaymentIntent,
) -> Result<TransitionOutcome, PaymentGatewayError> {
    match (updated, payment.status) {
        (true, _) => Ok(TransitionOutcome::Applied(payment)),
        (false, s) if s == target => Ok(TransitionOutcome::AlreadyApplied(payment)),
        (false, PaymentStatus::Pending) => Err(PaymentGatewayError::DatabaseError(format!(
            "Payment {} is still pending after a transition to {target}",
            payment.id
        ))),
        (false, _) => Ok(TransitionOutcome::Conflict(payment)),
    }
}

#[async_trait]
impl ProductCatalog for SqliteDatabase {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let product = products::insert_product(product, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn fetch_product(&self, id: ProductId) -> Result<Option<Product>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product(id, &mut conn).await
    }

    async fn fetch_products(&self) -> Result<Vec<Product>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_products(&mut conn).await
    }

    async fn set_product_active(&self, id: ProductId, active: bool) -> Result<Product, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let product = products::set_active(id, active, &mut tx).await?;
        tx.commit().await?;
        product.ok_or(PaymentGatewayError::ProductNotFound(id))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let deleted = products::delete_product(id, &mut tx).await?;
        tx.commit().await?;
        Ok(deleted)
    }
}

#[async_trait]
impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_payment(&self, payment: NewPaymentIntent) -> Result<PaymentIntent, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::insert_payment(payment, &mut tx).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn fetch_payment(&self, id: &PaymentId) -> Result<Option<PaymentIntent>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment(id, &mut conn).await
    }

    async fn fetch_payments_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<PaymentIntent>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payments_for_product(product_id, &mut conn).await
    }

    async fn fetch_pending_payments(&self) -> Result<Vec<PaymentIntent>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_pending_payments(&mut conn).await
    }

    async fn fetch_payment_by_tx_hash(&self, tx_hash: &str) -> Result<Option<PaymentIntent>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment_by_tx_hash(tx_hash, &mut conn).await
    }

    /// In a single atomic transaction,
    /// * conditionally moves the payment from `Pending` to `Confirmed`,
    /// * reads back the payment to report what happened.
    async fn try_confirm_payment(
        &self,
        id: &PaymentId,
        tx_hash: &str,
    ) -> Result<TransitionOutcome, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let updated = payments::mark_confirmed(id, tx_hash, &mut tx).await?;
        let payment = payments::fetch_payment(id, &mut tx).await?.ok_or(PaymentGatewayError::PaymentNotFound(*id))?;
        tx.commit().await?;
        if updated {
            info!("🗃️ Payment {id} confirmed by transaction {tx_hash}");
        }
        outcome_for(updated, PaymentStatus::Confirmed, payment)
    }

    async fn try_fail_payment(
        &self,
        id: &PaymentId,
        reason: &FailureReason,
    ) -> Result<TransitionOutcome, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let updated = payments::mark_failed(id, reason, &mut tx).await?;
        let payment = payments::fetch_payment(id, &mut tx).await?.ok_or(PaymentGatewayError::PaymentNotFound(*id))?;
        tx.commit().await?;
        if updated {
            info!("🗃️ Payment {id} failed: {reason}");
        }
        outcome_for(updated, PaymentStatus::Failed, payment)
    }

    async fn claim_notification(&self, id: &PaymentId) -> Result<Option<PaymentIntent>, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let claimed = payments::claim_notification(id, &mut tx).await?;
        tx.commit().await?;
        trace!("🗃️ Notification claim for payment {id}: {}", claimed.is_some());
        Ok(claimed)
    }

    async fn record_poll_attempt(&self, id: &PaymentId) -> Result<Option<i64>, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let count = payments::record_poll_attempt(id, &mut tx).await?;
        tx.commit().await?;
        Ok(count)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `CPG_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, PaymentGatewayError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, PaymentGatewayError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date with the embedded migrations.
    pub async fn run_migrations(&self) -> Result<(), PaymentGatewayError> {
        migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PaymentGatewayError::DatabaseError(format!("Migrations failed. {e}")))?;
        info!("🗃️ Migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
