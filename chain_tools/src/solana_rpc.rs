use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use cpg_common::Chain;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::{
    config::SolanaRpcConfig,
    data_objects::{ObservedTransfer, ParsedTransaction, RpcResponse, SignatureInfo},
    http::{build_client, read_json},
    ChainToolsError,
};

/// Depth reported for `finalized` transactions: the maximum lockout, after which a block cannot be rolled back.
pub const FINALIZED_DEPTH: u64 = 32;

/// JSON-RPC error codes that node providers use for throttling.
const RATE_LIMIT_CODES: [i64; 2] = [429, -32005];

/// Client for a Solana JSON-RPC node, used to look up native SOL transfers into a wallet.
#[derive(Clone)]
pub struct SolanaRpcApi {
    config: SolanaRpcConfig,
    client: Arc<Client>,
    request_id: Arc<AtomicU64>,
}

/// Maps the cluster's commitment level for a transaction onto a confirmation depth.
pub fn confirmation_depth(status: Option<&str>) -> u64 {
    match status {
        Some("finalized") => FINALIZED_DEPTH,
        Some("confirmed") => 1,
        _ => 0,
    }
}

impl SolanaRpcApi {
    pub fn new(config: SolanaRpcConfig) -> Result<Self, ChainToolsError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = build_client(headers, config.timeout)?;
        Ok(Self { config, client: Arc::new(client), request_id: Arc::new(AtomicU64::new(1)) })
    }

    /// Sends a single JSON-RPC request and unwraps the `result` member. A `null` result is returned as `None`.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>, ChainToolsError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        trace!("⛓️ Sending RPC call #{id}: {method}");
        let response = self.client.post(&self.config.url).json(&body).send().await?;
        let response = read_json::<RpcResponse<T>>(response).await?;
        match response.error {
            Some(e) if RATE_LIMIT_CODES.contains(&e.code) => Err(ChainToolsError::RateLimited(e.message)),
            Some(e) => Err(ChainToolsError::RpcError { code: e.code, message: e.message }),
            None => Ok(response.result),
        }
    }

    /// Returns native SOL transfers into `address` from successful transactions with a block time at or after
    /// `since`, newest first.
    pub async fn incoming_transfers(
        &self,
        address: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ObservedTransfer>, ChainToolsError> {
        let params = json!([address, { "limit": self.config.signature_limit, "commitment": "confirmed" }]);
        let signatures =
            self.call::<Vec<SignatureInfo>>("getSignaturesForAddress", params).await?.unwrap_or_default();
        let cutoff = since.timestamp();
        let mut transfers = Vec::new();
        for info in signatures {
            if info.err.as_ref().is_some_and(|e| !e.is_null()) {
                continue;
            }
            // Signatures are newest first, so nothing after an old one can qualify
            if info.block_time.is_some_and(|t| t < cutoff) {
                break;
            }
            let received = self.transfers_into(address, &info).await?;
            transfers.extend(received.into_iter().filter(|t| t.timestamp.timestamp() >= cutoff));
        }
        debug!("⛓️ {} incoming SOL transfers to {address} since {since}", transfers.len());
        Ok(transfers)
    }

    /// Returns one transfer per source wallet that sent SOL to `address` in the transaction, with the lamports from
    /// that source summed.
    async fn transfers_into(
        &self,
        address: &str,
        info: &SignatureInfo,
    ) -> Result<Vec<ObservedTransfer>, ChainToolsError> {
        let params = json!([
            info.signature,
            { "encoding": "jsonParsed", "maxSupportedTransactionVersion": 0, "commitment": "confirmed" }
        ]);
        let Some(tx) = self.call::<ParsedTransaction>("getTransaction", params).await? else {
            trace!("⛓️ Transaction {} is not available yet", info.signature);
            return Ok(Vec::new());
        };
        if tx.meta.as_ref().and_then(|m| m.err.as_ref()).is_some_and(|e| !e.is_null()) {
            return Ok(Vec::new());
        }
        let mut by_source: Vec<(String, u128)> = Vec::new();
        for ix in &tx.transaction.message.instructions {
            let Some((from, to, amount)) = system_transfer(ix) else {
                continue;
            };
            if to != address {
                continue;
            }
            match by_source.iter_mut().find(|(source, _)| *source == from) {
                Some((_, total)) => *total = total.saturating_add(u128::from(amount)),
                None => by_source.push((from, u128::from(amount))),
            }
        }
        if by_source.is_empty() {
            return Ok(Vec::new());
        }
        let seconds = tx.block_time.or(info.block_time).ok_or_else(|| {
            ChainToolsError::InvalidResponse(format!("Transaction {} has no block time", info.signature))
        })?;
        let timestamp = DateTime::<Utc>::from_timestamp(seconds, 0)
            .ok_or_else(|| ChainToolsError::InvalidResponse(format!("Invalid block time {seconds}")))?;
        let chain = Chain::Solana;
        let confirmations = confirmation_depth(info.confirmation_status.as_deref());
        by_source
            .into_iter()
            .map(|(from, lamports)| {
                let amount =
                    chain.from_base_units(lamports).map_err(|e| ChainToolsError::InvalidAmount(e.to_string()))?;
                Ok(ObservedTransfer {
                    hash: info.signature.clone(),
                    from,
                    to: address.to_string(),
                    amount,
                    asset: chain.native_asset().to_string(),
                    confirmations,
                    timestamp,
                })
            })
            .collect()
    }
}

/// Extracts `(source, destination, lamports)` from a parsed System Program `transfer` instruction.
fn system_transfer(ix: &Value) -> Option<(String, String, u64)> {
    if ix["program"].as_str() != Some("system") || ix["parsed"]["type"].as_str() != Some("transfer") {
        return None;
    }
    let info = &ix["parsed"]["info"];
    let source = info["source"].as_str()?.to_string();
    let destination = info["destination"].as_str()?.to_string();
    let lamports = info["lamports"].as_u64()?;
    Some((source, destination, lamports))
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;
    use mockito::Matcher;
    use rust_decimal_macros::dec;

    use super::*;

    const MERCHANT: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
    const BUYER: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";
    const OTHER: &str = "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T";

    fn api_for(server: &mockito::Server) -> SolanaRpcApi {
        SolanaRpcApi::new(SolanaRpcConfig::new(&server.url())).expect("Failed to create client")
    }

    fn transaction(block_time: i64, instructions: Value) -> String {
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": {
                "blockTime": block_time,
                "slot": 270000000,
                "meta": { "err": null, "fee": 5000 },
                "transaction": { "message": { "instructions": instructions } }
            }
        })
        .to_string()
    }

    fn transfer_ix(source: &str, destination: &str, lamports: u64) -> Value {
        json!({
            "program": "system",
            "programId": "11111111111111111111111111111111",
            "parsed": { "type": "transfer", "info": { "source": source, "destination": destination, "lamports": lamports } }
        })
    }

    #[test]
    fn commitment_levels() {
        assert_eq!(confirmation_depth(Some("finalized")), FINALIZED_DEPTH);
        assert_eq!(confirmation_depth(Some("confirmed")), 1);
        assert_eq!(confirmation_depth(Some("processed")), 0);
        assert_eq!(confirmation_depth(None), 0);
    }

    #[tokio::test]
    async fn incoming_sol_transfers() {
        let _ = env_logger::try_init();
        let mut server = mockito::Server::new_async().await;
        let signatures = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": [
                { "signature": "sigNew", "slot": 3, "err": null, "blockTime": 1717243300, "confirmationStatus": "finalized" },
                { "signature": "sigFailed", "slot": 2, "err": { "InstructionError": [0, "Custom"] }, "blockTime": 1717243290, "confirmationStatus": "finalized" },
                { "signature": "sigOld", "slot": 1, "err": null, "blockTime": 1717200000, "confirmationStatus": "finalized" }
            ]
        });
        let sigs_mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "method": "getSignaturesForAddress" })))
            .with_status(200)
            .with_body(signatures.to_string())
            .create_async()
            .await;
        let tx_mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "method": "getTransaction" })))
            .with_status(200)
            .with_body(transaction(1_717_243_300, json!([transfer_ix(BUYER, MERCHANT, 250_000_000)])))
            .expect(1)
            .create_async()
            .await;
        let since = Utc.timestamp_opt(1_717_243_000, 0).unwrap();
        let transfers = api_for(&server).incoming_transfers(MERCHANT, since).await.expect("Query failed");
        sigs_mock.assert_async().await;
        tx_mock.assert_async().await;
        assert_eq!(transfers.len(), 1);
        let tx = &transfers[0];
        assert_eq!(tx.hash, "sigNew");
        assert_eq!(tx.from, BUYER);
        assert_eq!(tx.to, MERCHANT);
        assert_eq!(tx.amount, dec!(0.25));
        assert_eq!(tx.asset, "SOL");
        assert_eq!(tx.confirmations, FINALIZED_DEPTH);
    }

    #[tokio::test]
    async fn transfers_are_attributed_to_each_source() {
        let mut server = mockito::Server::new_async().await;
        let signatures = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": [{ "signature": "sigShared", "slot": 3, "err": null, "blockTime": 1717243300, "confirmationStatus": "finalized" }]
        });
        let _sigs = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "method": "getSignaturesForAddress" })))
            .with_status(200)
            .with_body(signatures.to_string())
            .create_async()
            .await;
        let instructions = json!([
            transfer_ix(BUYER, MERCHANT, 1_000_000),
            transfer_ix(OTHER, MERCHANT, 499_000_000),
            transfer_ix(BUYER, MERCHANT, 2_000_000),
            transfer_ix(OTHER, BUYER, 7_000_000)
        ]);
        let _tx = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "method": "getTransaction" })))
            .with_status(200)
            .with_body(transaction(1_717_243_300, instructions))
            .create_async()
            .await;
        let since = Utc.timestamp_opt(1_717_243_000, 0).unwrap();
        let transfers = api_for(&server).incoming_transfers(MERCHANT, since).await.expect("Query failed");
        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0].from, BUYER);
        assert_eq!(transfers[0].amount, dec!(0.003));
        assert_eq!(transfers[1].from, OTHER);
        assert_eq!(transfers[1].amount, dec!(0.499));
        assert!(transfers.iter().all(|t| t.hash == "sigShared" && t.to == MERCHANT));
    }

    #[tokio::test]
    async fn outgoing_transfers_are_ignored() {
        let mut server = mockito::Server::new_async().await;
        let signatures = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": [{ "signature": "sigOut", "slot": 3, "err": null, "blockTime": 1717243300, "confirmationStatus": "confirmed" }]
        });
        let _sigs = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "method": "getSignaturesForAddress" })))
            .with_status(200)
            .with_body(signatures.to_string())
            .create_async()
            .await;
        let _tx = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "method": "getTransaction" })))
            .with_status(200)
            .with_body(transaction(1_717_243_300, json!([transfer_ix(MERCHANT, BUYER, 1_000)])))
            .create_async()
            .await;
        let since = Utc.timestamp_opt(1_717_243_000, 0).unwrap();
        let transfers = api_for(&server).incoming_transfers(MERCHANT, since).await.expect("Query failed");
        assert!(transfers.is_empty());
    }

    #[tokio::test]
    async fn rpc_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"Too many requests"}}"#)
            .create_async()
            .await;
        let err = api_for(&server).incoming_transfers(MERCHANT, Utc::now()).await.unwrap_err();
        assert!(matches!(err, ChainToolsError::RateLimited(_)));

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"Invalid param: WrongSize"}}"#)
            .create_async()
            .await;
        let err = api_for(&server).incoming_transfers("nope", Utc::now()).await.unwrap_err();
        assert!(matches!(err, ChainToolsError::RpcError { code: -32602, .. }));
        assert!(!err.is_transient());
    }
}
