use rust_decimal::{prelude::FromPrimitive, Decimal};
use serde_json::Value;

use crate::ChainToolsError;

/// Maps an asset ticker onto the price feed's coin id. Unknown tickers are passed through lower-cased.
pub fn coin_id(asset: &str) -> String {
    match asset.trim().to_ascii_uppercase().as_str() {
        "SOL" => "solana".to_string(),
        "ETH" => "ethereum".to_string(),
        other => other.to_ascii_lowercase(),
    }
}

/// Price feeds send prices as JSON numbers. Strings are tolerated too.
pub fn decimal_from_json(value: &Value) -> Result<Decimal, ChainToolsError> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(Decimal::from(i));
            }
            let exact = n.to_string().parse::<Decimal>().ok();
            exact
                .or_else(|| Decimal::from_scientific(&n.to_string()).ok())
                .or_else(|| n.as_f64().and_then(Decimal::from_f64))
                .ok_or_else(|| ChainToolsError::InvalidAmount(n.to_string()))
        },
        Value::String(s) => s.trim().parse::<Decimal>().map_err(|e| ChainToolsError::InvalidAmount(format!("{s}. {e}"))),
        other => Err(ChainToolsError::InvalidAmount(other.to_string())),
    }
}

/// Parses an unsigned integer amount of base units (wei, lamports) sent as a decimal string.
pub fn parse_base_units(units: &str) -> Result<u128, ChainToolsError> {
    units.trim().parse::<u128>().map_err(|e| ChainToolsError::InvalidAmount(format!("{units}. {e}")))
}
