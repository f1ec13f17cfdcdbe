mod chain;

pub mod helpers;
mod secret;

pub use chain::{AmountConversionError, Chain, ChainParseError};
pub use secret::Secret;
