use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainToolsError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Request could not be sent: {0}")]
    RequestError(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The remote service is rate limiting requests. {0}")]
    RateLimited(String),
    #[error("JSON-RPC call failed. Error {code}. {message}")]
    RpcError { code: i64, message: String },
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("The price feed does not list {0}")]
    UnsupportedAsset(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

impl ChainToolsError {
    /// Errors that might go away if the same request is sent again later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestError(_) | Self::Timeout(_) | Self::RateLimited(_) => true,
            Self::QueryError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ChainToolsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::JsonError(e.to_string())
        } else {
            Self::RequestError(e.to_string())
        }
    }
}
