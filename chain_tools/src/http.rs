use std::time::Duration;

use log::*;
use reqwest::{header::HeaderMap, Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::ChainToolsError;

pub(crate) fn build_client(headers: HeaderMap, timeout: Duration) -> Result<Client, ChainToolsError> {
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| ChainToolsError::Initialization(e.to_string()))
}

/// Deserializes a successful response, or maps the failure status onto the matching [`ChainToolsError`].
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ChainToolsError> {
    let status = response.status();
    if status.is_success() {
        trace!("Query successful. {status}");
        return response.json::<T>().await.map_err(|e| ChainToolsError::JsonError(e.to_string()));
    }
    let message = response.text().await.unwrap_or_default();
    if status == StatusCode::TOO_MANY_REQUESTS {
        Err(ChainToolsError::RateLimited(message))
    } else {
        Err(ChainToolsError::QueryError { status: status.as_u16(), message })
    }
}
