//! Glue between the concrete clients in `chain_tools` and the collaborator traits of the payment engine.
pub mod chain;
pub mod notifications;
