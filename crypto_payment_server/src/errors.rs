use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use crypto_payment_engine::{PaymentGatewayError, PriceOracleError};
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request conflicts with the current state. {0}")]
    Conflict(String),
    #[error("A required service is unavailable. {0}")]
    ServiceUnavailable(String),
    #[error("An upstream service failed. {0}")]
    UpstreamError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<PaymentGatewayError> for ServerError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::Validation(_) => Self::ValidationError(e.to_string()),
            PaymentGatewayError::PaymentNotFound(_) | PaymentGatewayError::ProductNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            PaymentGatewayError::ProductInUse(_) | PaymentGatewayError::TransactionAlreadyClaimed(_) => {
                Self::Conflict(e.to_string())
            },
            PaymentGatewayError::PriceUnavailable(e) => e.into(),
            PaymentGatewayError::ChainQuery(_) => Self::UpstreamError(e.to_string()),
            PaymentGatewayError::QuoteError(_) => Self::ServiceUnavailable(e.to_string()),
            PaymentGatewayError::DatabaseError(_) | PaymentGatewayError::CorruptRecord(_) => {
                error!("💻️ Backend error: {e}");
                Self::BackendError(e.to_string())
            },
        }
    }
}

impl From<PriceOracleError> for ServerError {
    fn from(e: PriceOracleError) -> Self {
        match e {
            PriceOracleError::UnsupportedAsset(_) => Self::NoRecordFound(e.to_string()),
            _ => Self::ServiceUnavailable(e.to_string()),
        }
    }
}
