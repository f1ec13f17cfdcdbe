use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A native-asset transfer seen on chain, already converted into whole units of the asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedTransfer {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    pub asset: String,
    pub confirmations: u64,
    pub timestamp: DateTime<Utc>,
}

//--------------------------------------      Etherscan      ---------------------------------------------------------

/// The envelope every Etherscan `account` call returns. `result` is an array on success and a plain string on
/// failure, so it is kept as a raw value until `status` has been inspected.
#[derive(Debug, Clone, Deserialize)]
pub struct EtherscanResponse {
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub result: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtherscanTransaction {
    pub hash: String,
    pub from: String,
    #[serde(default)]
    pub to: String,
    /// Amount in wei
    pub value: String,
    pub time_stamp: String,
    #[serde(default)]
    pub confirmations: String,
    #[serde(default)]
    pub is_error: String,
}

//--------------------------------------     Solana RPC      ---------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    #[serde(default)]
    pub err: Option<Value>,
    pub block_time: Option<i64>,
    pub confirmation_status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTransaction {
    pub block_time: Option<i64>,
    pub meta: Option<TransactionMeta>,
    pub transaction: TransactionEnvelope,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionMeta {
    #[serde(default)]
    pub err: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionEnvelope {
    pub message: TransactionMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionMessage {
    #[serde(default)]
    pub instructions: Vec<Value>,
}
