use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{ConversionError, NewProduct, Product, ProductId},
    traits::PaymentGatewayError,
};

#[derive(Debug, Clone, FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    price_usd: String,
    chain: String,
    currency: String,
    recipient_wallet: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = ConversionError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let price_usd = row
            .price_usd
            .parse::<Decimal>()
            .map_err(|e| ConversionError(format!("Product {} has an invalid price: {e}", row.id)))?;
        let chain = row.chain.parse().map_err(|e| ConversionError(format!("Product {}: {e}", row.id)))?;
        Ok(Product {
            id: ProductId(row.id),
            name: row.name,
            price_usd,
            chain,
            currency: row.currency,
            recipient_wallet: row.recipient_wallet,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn to_product(row: Option<ProductRow>) -> Result<Option<Product>, PaymentGatewayError> {
    Ok(row.map(Product::try_from).transpose()?)
}

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, PaymentGatewayError> {
    let now = Utc::now();
    let mut rows: Vec<ProductRow> = sqlx::query_as(
        r#"
            INSERT INTO products (name, price_usd, chain, currency, recipient_wallet, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(product.name)
    .bind(product.price_usd.to_string())
    .bind(product.chain.to_string())
    .bind(product.currency)
    .bind(product.recipient_wallet)
    .bind(product.is_active)
    .bind(now)
    .bind(now)
    .fetch_all(conn)
    .await?;
    let row = rows.pop().ok_or_else(|| PaymentGatewayError::DatabaseError("Product insert returned no row".into()))?;
    debug!("🗃️ Product #{} ({}) inserted", row.id, row.name);
    Ok(Product::try_from(row)?)
}

pub async fn fetch_product(id: ProductId, conn: &mut SqliteConnection) -> Result<Option<Product>, PaymentGatewayError> {
    let row = sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await?;
    to_product(row)
}

pub async fn fetch_products(conn: &mut SqliteConnection) -> Result<Vec<Product>, PaymentGatewayError> {
    let rows: Vec<ProductRow> = sqlx::query_as("SELECT * FROM products ORDER BY id").fetch_all(conn).await?;
    let products = rows.into_iter().map(Product::try_from).collect::<Result<Vec<_>, _>>()?;
    Ok(products)
}

pub async fn set_active(
    id: ProductId,
    active: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, PaymentGatewayError> {
    let mut rows: Vec<ProductRow> =
        sqlx::query_as("UPDATE products SET is_active = $1, updated_at = $2 WHERE id = $3 RETURNING *")
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .fetch_all(conn)
            .await?;
    to_product(rows.pop())
}

/// Deletes a product that no payment refers to. Run this inside a transaction so that the reference check and the
/// delete see the same data.
pub async fn delete_product(id: ProductId, conn: &mut SqliteConnection) -> Result<bool, PaymentGatewayError> {
    let referenced: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM payments WHERE product_id = $1)")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    if referenced {
        return Err(PaymentGatewayError::ProductInUse(id));
    }
    let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(conn).await.map_err(|e| match e {
        sqlx::Error::Database(ref dbe) if is_foreign_key_error(&**dbe) => PaymentGatewayError::ProductInUse(id),
        e => e.into(),
    })?;
    Ok(result.rows_affected() == 1)
}

// SQLITE_CONSTRAINT_FOREIGNKEY (787) or SQLITE_CONSTRAINT_TRIGGER (1811)
fn is_foreign_key_error(err: &dyn sqlx::error::DatabaseError) -> bool {
    err.is_foreign_key_violation() || matches!(err.code().as_deref(), Some("787") | Some("1811"))
}
