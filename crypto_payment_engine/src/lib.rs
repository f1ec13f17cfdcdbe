//! Crypto Payment Engine
//!
//! The engine lets a merchant accept on-chain payments for USD-priced products without running wallet
//! infrastructure. It converts the USD price into a crypto amount at a live exchange rate, watches the chain for a
//! matching transfer from the buyer, and settles each payment intent exactly once.
//!
//! The library is divided into these sections:
//! 1. Storage ([`mod@sqlite`] and [`mod@traits`]). The engine talks to its backend through the
//!    [`PaymentGatewayDatabase`] and [`ProductCatalog`] traits. SQLite is the supported backend. The data types used
//!    in storage are defined in [`mod@db_types`] and are public.
//! 2. External collaborators ([`PriceOracle`], [`ChainWatcher`], [`NotificationDispatcher`]). The engine only ever
//!    *observes* the chain. It does not hold keys, build transactions or broadcast them.
//! 3. The public API ([`mod@cpe_api`]): [`AmountReconciler`], [`PriceApi`], [`PaymentFlowApi`] and
//!    [`VerificationScheduler`].
//!
//! The engine also publishes events when payments are confirmed or fail. See [`mod@events`] for how to hook into
//! them.
pub mod cpe_api;
pub mod db_types;
pub mod events;
pub mod helpers;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use cpe_api::{
    amount_reconciler::{AmountReconciler, ReconcileError},
    payment_flow_api::{PaymentFlowApi, PaymentRequest},
    price_api::{PriceApi, PriceQuote, RetryPolicy},
    scheduler_objects::{ConfirmationPolicy, SchedulerConfig, VerificationOutcome},
    verification_scheduler::VerificationScheduler,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    ChainQueryError,
    ChainWatcher,
    NotificationDispatcher,
    NotificationError,
    PaymentGatewayDatabase,
    PaymentGatewayError,
    PriceOracle,
    PriceOracleError,
    ProductCatalog,
    TransitionOutcome,
};
