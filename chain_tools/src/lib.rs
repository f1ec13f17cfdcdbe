//! HTTP clients for the services the payment gateway depends on: a USD price feed, an Ethereum block explorer and
//! a Solana JSON-RPC node. Nothing in here knows about payments; the server adapts these clients to the engine's
//! traits.
mod config;
mod error;
mod etherscan;
mod http;
mod price_feed;
mod solana_rpc;

mod data_objects;
pub mod helpers;

pub use config::{EtherscanConfig, PriceFeedConfig, SolanaRpcConfig};
pub use data_objects::ObservedTransfer;
pub use error::ChainToolsError;
pub use etherscan::EtherscanApi;
pub use price_feed::PriceFeedApi;
pub use solana_rpc::{confirmation_depth, SolanaRpcApi, FINALIZED_DEPTH};
