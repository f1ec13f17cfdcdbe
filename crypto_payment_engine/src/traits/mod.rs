//! Behaviour the payment engine expects from its backends and external collaborators.
//!
//! * [`PaymentGatewayDatabase`] and [`ProductCatalog`] are implemented by storage backends, e.g.
//!   [`crate::SqliteDatabase`].
//! * [`PriceOracle`], [`ChainWatcher`] and [`NotificationDispatcher`] abstract over the outside world: a USD price
//!   feed, a chain explorer or RPC node, and the channel that tells buyers their payment went through.
mod chain_watcher;
mod data_objects;
mod notification;
mod payment_gateway_database;
mod price_oracle;
mod product_catalog;

pub use chain_watcher::{ChainQueryError, ChainWatcher};
pub use data_objects::TransitionOutcome;
pub use notification::{NotificationDispatcher, NotificationError};
pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
pub use price_oracle::{PriceOracle, PriceOracleError};
pub use product_catalog::ProductCatalog;
