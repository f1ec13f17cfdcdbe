mod validation;

pub use validation::{validate_email, validate_wallet_address, ValidationError};
