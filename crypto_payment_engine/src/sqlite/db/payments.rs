//! Low-level access to the `payments` table.
//!
//! The state-changing functions here are single conditional `UPDATE`s. Each reports whether it changed a row so that
//! the caller can tell a fresh transition from a repeated one.
use chrono::{DateTime, Utc};
use log::{debug, trace};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{ConversionError, FailureReason, NewPaymentIntent, PaymentId, PaymentIntent, PaymentStatus, ProductId},
    traits::PaymentGatewayError,
};

#[derive(Debug, Clone, FromRow)]
struct PaymentRow {
    id: String,
    product_id: i64,
    chain: String,
    asset: String,
    recipient_wallet: String,
    buyer_email: String,
    buyer_wallet: String,
    price_usd: String,
    price_quote: String,
    expected_crypto_amount: String,
    status: PaymentStatus,
    failure_reason: Option<String>,
    tx_hash: Option<String>,
    attempt_count: i64,
    last_polled_at: Option<DateTime<Utc>>,
    notified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

fn parse_decimal(id: &str, field: &str, value: &str) -> Result<Decimal, ConversionError> {
    value.parse::<Decimal>().map_err(|e| ConversionError(format!("Payment {id} has an invalid {field} ({value}): {e}")))
}

impl TryFrom<PaymentRow> for PaymentIntent {
    type Error = ConversionError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let price_usd = parse_decimal(&row.id, "price_usd", &row.price_usd)?;
        let price_quote = parse_decimal(&row.id, "price_quote", &row.price_quote)?;
        let expected_crypto_amount = parse_decimal(&row.id, "expected_crypto_amount", &row.expected_crypto_amount)?;
        let chain = row.chain.parse().map_err(|e| ConversionError(format!("Payment {}: {e}", row.id)))?;
        let failure_reason = row.failure_reason.as_deref().map(str::parse::<FailureReason>).transpose()?;
        Ok(PaymentIntent {
            id: row.id.parse()?,
            product_id: ProductId(row.product_id),
            chain,
            asset: row.asset,
            recipient_wallet: row.recipient_wallet,
            buyer_email: row.buyer_email,
            buyer_wallet: row.buyer_wallet,
            price_usd,
            price_quote,
            expected_crypto_amount,
            status: row.status,
            failure_reason,
            tx_hash: row.tx_hash,
            attempt_count: row.attempt_count,
            last_polled_at: row.last_polled_at,
            notified_at: row.notified_at,
            created_at: row.created_at,
            confirmed_at: row.confirmed_at,
            updated_at: row.updated_at,
        })
    }
}

fn to_payment(row: Option<PaymentRow>) -> Result<Option<PaymentIntent>, PaymentGatewayError> {
    Ok(row.map(PaymentIntent::try_from).transpose()?)
}

fn to_payments(rows: Vec<PaymentRow>) -> Result<Vec<PaymentIntent>, PaymentGatewayError> {
    let payments = rows.into_iter().map(PaymentIntent::try_from).collect::<Result<Vec<_>, _>>()?;
    Ok(payments)
}

/// Inserts a new payment intent in the `Pending` state. This is not atomic with respect to any other call. Embed it in
/// a transaction if you need that, passing `&mut *tx` as the connection argument.
pub async fn insert_payment(
    payment: NewPaymentIntent,
    conn: &mut SqliteConnection,
) -> Result<PaymentIntent, PaymentGatewayError> {
    let now = Utc::now();
    let mut rows: Vec<PaymentRow> = sqlx::query_as(
        r#"
            INSERT INTO payments (
                id,
                product_id,
                chain,
                asset,
                recipient_wallet,
                buyer_email,
                buyer_wallet,
                price_usd,
                price_quote,
                expected_crypto_amount,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(payment.id.to_string())
    .bind(payment.product_id)
    .bind(payment.chain.to_string())
    .bind(payment.asset)
    .bind(payment.recipient_wallet)
    .bind(payment.buyer_email)
    .bind(payment.buyer_wallet)
    .bind(payment.price_usd.to_string())
    .bind(payment.price_quote.to_string())
    .bind(payment.expected_crypto_amount.to_string())
    .bind(now)
    .bind(now)
    .fetch_all(conn)
    .await?;
    let row = rows.pop().ok_or_else(|| PaymentGatewayError::DatabaseError("Payment insert returned no row".into()))?;
    debug!("🗃️ Payment {} inserted for product #{}", row.id, row.product_id);
    Ok(PaymentIntent::try_from(row)?)
}

pub async fn fetch_payment(
    id: &PaymentId,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, PaymentGatewayError> {
    let row = sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(id.to_string()).fetch_optional(conn).await?;
    to_payment(row)
}

pub async fn fetch_payments_for_product(
    product_id: ProductId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentIntent>, PaymentGatewayError> {
    let rows = sqlx::query_as("SELECT * FROM payments WHERE product_id = $1 ORDER BY created_at")
        .bind(product_id)
        .fetch_all(conn)
        .await?;
    to_payments(rows)
}

pub async fn fetch_pending_payments(conn: &mut SqliteConnection) -> Result<Vec<PaymentIntent>, PaymentGatewayError> {
    let rows = sqlx::query_as("SELECT * FROM payments WHERE status = 'Pending' ORDER BY created_at")
        .fetch_all(conn)
        .await?;
    to_payments(rows)
}

pub async fn fetch_payment_by_tx_hash(
    tx_hash: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, PaymentGatewayError> {
    let row = sqlx::query_as("SELECT * FROM payments WHERE tx_hash = $1").bind(tx_hash).fetch_optional(conn).await?;
    to_payment(row)
}

/// Sets the payment to `Confirmed` if, and only if, it is currently `Pending`. Returns `true` if the row was updated.
pub async fn mark_confirmed(
    id: &PaymentId,
    tx_hash: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, PaymentGatewayError> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
            UPDATE payments
            SET status = 'Confirmed', tx_hash = $1, confirmed_at = $2, updated_at = $3
            WHERE id = $4 AND status = 'Pending'
        "#,
    )
    .bind(tx_hash)
    .bind(now)
    .bind(now)
    .bind(id.to_string())
    .execute(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref dbe) if dbe.is_unique_violation() => {
            PaymentGatewayError::TransactionAlreadyClaimed(tx_hash.to_string())
        },
        e => e.into(),
    })?;
    let updated = result.rows_affected() == 1;
    trace!("🗃️ Confirm payment {id} with {tx_hash}: updated = {updated}");
    Ok(updated)
}

/// Sets the payment to `Failed` if, and only if, it is currently `Pending`. Returns `true` if the row was updated.
pub async fn mark_failed(
    id: &PaymentId,
    reason: &FailureReason,
    conn: &mut SqliteConnection,
) -> Result<bool, PaymentGatewayError> {
    let result = sqlx::query(
        r#"
            UPDATE payments
            SET status = 'Failed', failure_reason = $1, updated_at = $2
            WHERE id = $3 AND status = 'Pending'
        "#,
    )
    .bind(reason.to_string())
    .bind(Utc::now())
    .bind(id.to_string())
    .execute(conn)
    .await?;
    let updated = result.rows_affected() == 1;
    trace!("🗃️ Fail payment {id} ({reason}): updated = {updated}");
    Ok(updated)
}

pub async fn claim_notification(
    id: &PaymentId,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntent>, PaymentGatewayError> {
    let mut rows: Vec<PaymentRow> = sqlx::query_as(
        r#"
            UPDATE payments
            SET notified_at = $1
            WHERE id = $2 AND status = 'Confirmed' AND notified_at IS NULL
            RETURNING *;
        "#,
    )
    .bind(Utc::now())
    .bind(id.to_string())
    .fetch_all(conn)
    .await?;
    to_payment(rows.pop())
}

pub async fn record_poll_attempt(id: &PaymentId, conn: &mut SqliteConnection) -> Result<Option<i64>, PaymentGatewayError> {
    let now = Utc::now();
    let mut counts: Vec<i64> = sqlx::query_scalar(
        r#"
            UPDATE payments
            SET attempt_count = attempt_count + 1, last_polled_at = $1, updated_at = $2
            WHERE id = $3 AND status = 'Pending'
            RETURNING attempt_count;
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(id.to_string())
    .fetch_all(conn)
    .await?;
    Ok(counts.pop())
}
