//! # Crypto payment gateway server
//! This crate hosts the HTTP server for the payment gateway. It is responsible for:
//! * Accepting payment requests for products and quoting the crypto amount at the current price.
//! * Starting a verification poller for every new payment, and resuming pollers for pending payments at start-up.
//! * Answering manual verification and confirmation requests.
//! * Wiring the price feed, chain explorers and notification channel into the payment engine.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `POST /payments/create`: Create a payment intent.
//! * `POST /verify-payment`: Check the chain for a payment right now.
//! * `POST /send-confirmation`: Send the confirmation for a confirmed payment, if it was not sent already.
//! * `GET /products/{id}`: Fetch an active product.
//! * `GET /payments/{id}` and `GET /payments/product/{product_id}`: Read payment records.
//! * `GET /price/{asset}`: The current USD price of an asset.
pub mod cli;
pub mod config;
pub mod errors;

pub mod data_objects;
pub mod integrations;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
