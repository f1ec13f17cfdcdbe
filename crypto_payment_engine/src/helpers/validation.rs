//! Input validation for payment intents.
//!
//! Wallet addresses are checked for their chain-specific *format* only. Nothing here proves that an address exists
//! on chain or that the buyer controls it.
use std::sync::OnceLock;

use cpg_common::Chain;
use regex::Regex;
use thiserror::Error;

use crate::db_types::ProductId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{address} is not a valid {chain} wallet address")]
    InvalidWalletAddress { chain: Chain, address: String },
    #[error("{0} is not a valid email address")]
    InvalidEmail(String),
    #[error("Product {0} is not available for purchase")]
    ProductInactive(ProductId),
    #[error("Product {0} does not have a positive price")]
    InvalidProductPrice(ProductId),
}

fn solana_address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // base58: no 0, O, I or l
    RE.get_or_init(|| Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$").expect("static regex"))
}

fn ethereum_address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("static regex"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"))
}

pub fn validate_wallet_address(chain: Chain, address: &str) -> Result<(), ValidationError> {
    let valid = match chain {
        Chain::Solana => solana_address_regex().is_match(address),
        Chain::Ethereum => ethereum_address_regex().is_match(address),
    };
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidWalletAddress { chain, address: address.to_string() })
    }
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email_regex().is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(email.to_string()))
    }
}
