use async_trait::async_trait;
use chain_tools::{ChainToolsError, EtherscanApi, ObservedTransfer, PriceFeedApi, SolanaRpcApi};
use chrono::{DateTime, Utc};
use cpg_common::Chain;
use crypto_payment_engine::{
    db_types::ChainTransaction,
    ChainQueryError,
    ChainWatcher,
    PriceOracle,
    PriceOracleError,
};
use log::*;
use rust_decimal::Decimal;

use crate::{config::ServerConfig, errors::ServerError};

/// [`PriceOracle`] backed by the CoinGecko-style price feed.
#[derive(Clone)]
pub struct PriceFeedOracle {
    api: PriceFeedApi,
}

impl PriceFeedOracle {
    pub fn new(api: PriceFeedApi) -> Self {
        Self { api }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        let api = PriceFeedApi::new(config.price_feed.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self::new(api))
    }
}

#[async_trait]
impl PriceOracle for PriceFeedOracle {
    async fn fetch_price(&self, asset: &str) -> Result<Decimal, PriceOracleError> {
        self.api.usd_price(asset).await.map_err(price_error)
    }
}

fn price_error(e: ChainToolsError) -> PriceOracleError {
    match e {
        ChainToolsError::Timeout(_) => PriceOracleError::Timeout,
        ChainToolsError::RateLimited(_) => PriceOracleError::RateLimited,
        ChainToolsError::UnsupportedAsset(asset) => PriceOracleError::UnsupportedAsset(asset),
        e if e.is_transient() => PriceOracleError::Transport(e.to_string()),
        e => PriceOracleError::InvalidResponse(e.to_string()),
    }
}

/// [`ChainWatcher`] that reads Ethereum through an Etherscan-style explorer and Solana through a JSON-RPC node.
#[derive(Clone)]
pub struct ExplorerChainWatcher {
    etherscan: EtherscanApi,
    solana: SolanaRpcApi,
}

impl ExplorerChainWatcher {
    pub fn new(etherscan: EtherscanApi, solana: SolanaRpcApi) -> Self {
        Self { etherscan, solana }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        let init = |e: ChainToolsError| ServerError::InitializeError(e.to_string());
        let etherscan = EtherscanApi::new(config.etherscan.clone()).map_err(init)?;
        let solana = SolanaRpcApi::new(config.solana_rpc.clone()).map_err(init)?;
        Ok(Self::new(etherscan, solana))
    }
}

#[async_trait]
impl ChainWatcher for ExplorerChainWatcher {
    async fn find_matching(
        &self,
        chain: Chain,
        recipient: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChainTransaction>, ChainQueryError> {
        let transfers = match chain {
            Chain::Ethereum => self.etherscan.incoming_transfers(recipient, since).await,
            Chain::Solana => self.solana.incoming_transfers(recipient, since).await,
        }
        .map_err(|e| chain_error(chain, e))?;
        trace!("⛓️ {} {chain} transfers to {recipient}", transfers.len());
        Ok(transfers.into_iter().map(to_chain_transaction).collect())
    }
}

fn to_chain_transaction(t: ObservedTransfer) -> ChainTransaction {
    ChainTransaction {
        hash: t.hash,
        from_address: t.from,
        to_address: t.to,
        amount: t.amount,
        asset: t.asset,
        confirmations: t.confirmations,
        observed_at: t.timestamp,
    }
}

fn chain_error(chain: Chain, e: ChainToolsError) -> ChainQueryError {
    match e {
        ChainToolsError::RateLimited(_) => ChainQueryError::RateLimited(chain),
        e if e.is_transient() => ChainQueryError::Unreachable { chain, reason: e.to_string() },
        e => ChainQueryError::InvalidResponse { chain, reason: e.to_string() },
    }
}
