//! The public API of the payment engine.
//!
//! * [`amount_reconciler`] turns USD prices into crypto amounts and decides whether an observed amount is enough.
//! * [`price_api`] wraps a [`crate::traits::PriceOracle`] with timeouts and retries.
//! * [`payment_flow_api`] creates payment intents and owns every state transition.
//! * [`verification_scheduler`] polls the chain for each pending payment until it settles or times out.
pub mod amount_reconciler;
pub mod payment_flow_api;
pub mod price_api;
pub mod scheduler_objects;
pub mod verification_scheduler;
