use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PriceOracleError {
    #[error("Could not reach the price feed: {0}")]
    Transport(String),
    #[error("The price feed did not answer in time")]
    Timeout,
    #[error("The price feed is rate limiting requests")]
    RateLimited,
    #[error("The price feed returned an invalid response: {0}")]
    InvalidResponse(String),
    #[error("The price feed does not quote {0}")]
    UnsupportedAsset(String),
    #[error("The price feed quoted a non-positive price for {asset}: {price}")]
    NonPositivePrice { asset: String, price: Decimal },
    #[error("No price is available for {asset} after {attempts} attempts. Last error: {reason}")]
    PriceUnavailable { asset: String, attempts: u32, reason: String },
}

impl PriceOracleError {
    /// Transient errors are worth retrying. Everything else will fail the same way next time.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout | Self::RateLimited)
    }
}

/// A source of current USD prices for crypto assets.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Fetch the USD price of one unit of `asset` (e.g. `SOL`). Implementations make a single attempt; retries and
    /// timeouts are handled by [`crate::PriceApi`].
    async fn fetch_price(&self, asset: &str) -> Result<Decimal, PriceOracleError>;
}
