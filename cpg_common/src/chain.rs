use std::{fmt::Display, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

//--------------------------------------        Chain        ---------------------------------------------------------
/// The blockchains that products can be priced and paid on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Solana,
    Ethereum,
}

#[derive(Debug, Clone, Error)]
#[error("Unsupported chain: {0}")]
pub struct ChainParseError(String);

#[derive(Debug, Clone, Error)]
#[error("{units} base units cannot be represented as a {chain} amount")]
pub struct AmountConversionError {
    pub chain: Chain,
    pub units: u128,
}

impl Chain {
    /// The symbol of the chain's native asset
    pub fn native_asset(&self) -> &'static str {
        match self {
            Chain::Solana => "SOL",
            Chain::Ethereum => "ETH",
        }
    }

    /// Number of decimal places between the native asset and its smallest unit (lamports, wei)
    pub fn native_decimals(&self) -> u32 {
        match self {
            Chain::Solana => 9,
            Chain::Ethereum => 18,
        }
    }

    /// Converts an amount in the chain's smallest unit into a decimal amount of the native asset.
    pub fn from_base_units(&self, units: u128) -> Result<Decimal, AmountConversionError> {
        let err = || AmountConversionError { chain: *self, units };
        let units = i128::try_from(units).map_err(|_| err())?;
        Decimal::try_from_i128_with_scale(units, self.native_decimals()).map(|d| d.normalize()).map_err(|_| err())
    }

    /// Compares two addresses using the chain's rules. Ethereum addresses are case-insensitive hex (the mixed case
    /// is only a checksum); Solana base58 addresses are case-sensitive.
    pub fn same_address(&self, a: &str, b: &str) -> bool {
        match self {
            Chain::Solana => a.trim() == b.trim(),
            Chain::Ethereum => a.trim().eq_ignore_ascii_case(b.trim()),
        }
    }
}

impl Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Chain::Solana => write!(f, "solana"),
            Chain::Ethereum => write!(f, "ethereum"),
        }
    }
}

impl FromStr for Chain {
    type Err = ChainParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solana" | "sol" => Ok(Self::Solana),
            "ethereum" | "eth" => Ok(Self::Ethereum),
            _ => Err(ChainParseError(s.to_string())),
        }
    }
}
