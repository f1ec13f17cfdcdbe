use std::sync::Arc;

use chrono::{DateTime, Utc};
use cpg_common::Chain;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde_json::Value;

use crate::{
    config::EtherscanConfig,
    data_objects::{EtherscanResponse, EtherscanTransaction, ObservedTransfer},
    helpers::parse_base_units,
    http::{build_client, read_json},
    ChainToolsError,
};

/// Client for the Etherscan `account` API, used to look up native ETH transfers into a wallet.
#[derive(Clone)]
pub struct EtherscanApi {
    config: EtherscanConfig,
    client: Arc<Client>,
}

impl EtherscanApi {
    pub fn new(config: EtherscanConfig) -> Result<Self, ChainToolsError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = build_client(headers, config.timeout)?;
        Ok(Self { config, client: Arc::new(client) })
    }

    /// Returns successful ETH transfers into `address` with a block time at or after `since`, newest first.
    pub async fn incoming_transfers(
        &self,
        address: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ObservedTransfer>, ChainToolsError> {
        let offset = self.config.page_size.to_string();
        let mut params = vec![
            ("module", "account"),
            ("action", "txlist"),
            ("address", address),
            ("startblock", "0"),
            ("endblock", "99999999"),
            ("page", "1"),
            ("offset", offset.as_str()),
            ("sort", "desc"),
        ];
        if let Some(key) = &self.config.api_key {
            params.push(("apikey", key.reveal().as_str()));
        }
        trace!("⛓️ Fetching ETH transactions for {address}");
        let response = self.client.get(&self.config.base_url).query(&params).send().await?;
        let envelope = read_json::<EtherscanResponse>(response).await?;
        let transactions = unpack_transactions(envelope)?;
        let cutoff = since.timestamp();
        let mut transfers = Vec::with_capacity(transactions.len());
        for tx in transactions {
            if !tx.to.eq_ignore_ascii_case(address) || !(tx.is_error.is_empty() || tx.is_error == "0") {
                continue;
            }
            let transfer = to_transfer(tx)?;
            if transfer.timestamp.timestamp() < cutoff || transfer.amount.is_zero() {
                continue;
            }
            transfers.push(transfer);
        }
        debug!("⛓️ {} incoming ETH transfers to {address} since {since}", transfers.len());
        Ok(transfers)
    }
}

fn unpack_transactions(envelope: EtherscanResponse) -> Result<Vec<EtherscanTransaction>, ChainToolsError> {
    if envelope.status == "1" {
        return serde_json::from_value(envelope.result).map_err(|e| ChainToolsError::JsonError(e.to_string()));
    }
    if envelope.message.starts_with("No transactions found") {
        return Ok(Vec::new());
    }
    let detail = match &envelope.result {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if detail.to_ascii_lowercase().contains("rate limit") {
        Err(ChainToolsError::RateLimited(detail))
    } else {
        Err(ChainToolsError::InvalidResponse(format!("{}. {detail}", envelope.message)))
    }
}

fn to_transfer(tx: EtherscanTransaction) -> Result<ObservedTransfer, ChainToolsError> {
    let chain = Chain::Ethereum;
    let wei = parse_base_units(&tx.value)?;
    let amount = chain.from_base_units(wei).map_err(|e| ChainToolsError::InvalidAmount(e.to_string()))?;
    let seconds = tx
        .time_stamp
        .parse::<i64>()
        .map_err(|e| ChainToolsError::InvalidResponse(format!("Invalid timeStamp {}. {e}", tx.time_stamp)))?;
    let timestamp = DateTime::<Utc>::from_timestamp(seconds, 0)
        .ok_or_else(|| ChainToolsError::InvalidResponse(format!("Invalid timeStamp {seconds}")))?;
    let confirmations = tx.confirmations.parse::<u64>().unwrap_or(0);
    Ok(ObservedTransfer {
        hash: tx.hash,
        from: tx.from,
        to: tx.to,
        amount,
        asset: chain.native_asset().to_string(),
        confirmations,
        timestamp,
    })
}
