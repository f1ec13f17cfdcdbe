use async_trait::async_trait;

use crate::{
    db_types::{NewProduct, Product, ProductId},
    traits::PaymentGatewayError,
};

/// Durable storage for the merchant's products.
///
/// Price, chain, currency and recipient of a product cannot change once a payment references it. Only the active
/// flag can.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, PaymentGatewayError>;

    async fn fetch_product(&self, id: ProductId) -> Result<Option<Product>, PaymentGatewayError>;

    async fn fetch_products(&self) -> Result<Vec<Product>, PaymentGatewayError>;

    /// Sets the active flag, returning the updated product.
    async fn set_product_active(&self, id: ProductId, active: bool) -> Result<Product, PaymentGatewayError>;

    /// Deletes a product that no payment refers to. Returns `false` if there was no such product.
    async fn delete_product(&self, id: ProductId) -> Result<bool, PaymentGatewayError>;
}
