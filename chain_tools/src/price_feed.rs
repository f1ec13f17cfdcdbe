use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::{
    config::PriceFeedConfig,
    helpers::{coin_id, decimal_from_json},
    http::{build_client, read_json},
    ChainToolsError,
};

/// Client for a CoinGecko-compatible `simple/price` endpoint.
#[derive(Clone)]
pub struct PriceFeedApi {
    config: PriceFeedConfig,
    client: Arc<Client>,
}

impl PriceFeedApi {
    pub fn new(config: PriceFeedConfig) -> Result<Self, ChainToolsError> {
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        if let Some(key) = &config.api_key {
            let val = HeaderValue::from_str(key.reveal().as_str())
                .map_err(|e| ChainToolsError::Initialization(e.to_string()))?;
            headers.insert("x-cg-pro-api-key", val);
        }
        let client = build_client(headers, config.timeout)?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Fetches the current USD price of one unit of `asset` (e.g. `SOL`).
    pub async fn usd_price(&self, asset: &str) -> Result<Decimal, ChainToolsError> {
        let id = coin_id(asset);
        let url = self.url("/simple/price");
        trace!("💱️ Requesting {id} price from {url}");
        let response =
            self.client.get(url).query(&[("ids", id.as_str()), ("vs_currencies", "usd")]).send().await?;
        let body = read_json::<Value>(response).await?;
        let price = &body[id.as_str()]["usd"];
        if price.is_null() {
            debug!("💱️ Price feed returned no USD price for {id}: {body}");
            return Err(ChainToolsError::UnsupportedAsset(asset.to_string()));
        }
        let price = decimal_from_json(price)?;
        debug!("💱️ {asset} is trading at {price} USD");
        Ok(price)
    }
}
