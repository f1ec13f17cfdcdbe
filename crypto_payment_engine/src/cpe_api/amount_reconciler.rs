use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TOLERANCE_PERCENT: u32 = 1;
pub const DEFAULT_DISPLAY_PRECISION: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("Cannot quote against a non-positive asset price ({0})")]
    InvalidPrice(Decimal),
    #[error("The quoted amount is out of range ({price_usd} / {asset_price})")]
    Overflow { price_usd: Decimal, asset_price: Decimal },
    #[error("Tolerance must lie in [0, 1), got {0}")]
    InvalidTolerance(Decimal),
}

/// Converts USD prices into crypto amounts and decides whether an observed transfer covers the expected amount.
///
/// Matching is one-sided: anything at or above `expected * (1 - tolerance)` matches, so overpayments are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountReconciler {
    tolerance: Decimal,
    display_precision: u32,
}

impl Default for AmountReconciler {
    fn default() -> Self {
        Self { tolerance: Decimal::new(DEFAULT_TOLERANCE_PERCENT as i64, 2), display_precision: DEFAULT_DISPLAY_PRECISION }
    }
}

impl AmountReconciler {
    pub fn new(tolerance: Decimal, display_precision: u32) -> Result<Self, ReconcileError> {
        if tolerance < Decimal::ZERO || tolerance >= Decimal::ONE {
            return Err(ReconcileError::InvalidTolerance(tolerance));
        }
        Ok(Self { tolerance, display_precision })
    }

    pub fn tolerance(&self) -> Decimal {
        self.tolerance
    }

    pub fn display_precision(&self) -> u32 {
        self.display_precision
    }

    /// The crypto amount that pays `price_usd` when one unit of the asset is worth `asset_price` USD.
    pub fn quote(&self, price_usd: Decimal, asset_price: Decimal) -> Result<Decimal, ReconcileError> {
        if asset_price <= Decimal::ZERO {
            return Err(ReconcileError::InvalidPrice(asset_price));
        }
        price_usd.checked_div(asset_price).ok_or(ReconcileError::Overflow { price_usd, asset_price })
    }

    /// The amount to show the buyer. Rounds *up*, so paying the displayed amount always matches.
    pub fn display(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.display_precision, RoundingStrategy::AwayFromZero).normalize()
    }

    /// The smallest observed amount that still matches `expected`.
    pub fn minimum_accepted(&self, expected: Decimal) -> Decimal {
        expected * (Decimal::ONE - self.tolerance)
    }

    pub fn matches(&self, expected: Decimal, observed: Decimal) -> bool {
        observed >= self.minimum_accepted(expected)
    }
}
