use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cpg_common::Chain;
use thiserror::Error;

use crate::db_types::ChainTransaction;

#[derive(Debug, Clone, Error)]
pub enum ChainQueryError {
    #[error("Could not reach the {chain} query service: {reason}")]
    Unreachable { chain: Chain, reason: String },
    #[error("The {0} query service is rate limiting requests")]
    RateLimited(Chain),
    #[error("The {chain} query service returned an invalid response: {reason}")]
    InvalidResponse { chain: Chain, reason: String },
    #[error("{0} is not supported by this chain watcher")]
    UnsupportedChain(Chain),
}

/// Read-only access to on-chain transfers.
///
/// A failed query is an error. Implementations must never report a failure as an empty result.
#[async_trait]
pub trait ChainWatcher: Send + Sync {
    /// Returns native-asset transfers to `recipient` observed at or after `since`, settled or not. Settlement is
    /// judged by the caller from [`ChainTransaction::confirmations`].
    async fn find_matching(
        &self,
        chain: Chain,
        recipient: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChainTransaction>, ChainQueryError>;
}
