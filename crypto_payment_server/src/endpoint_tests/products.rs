use actix_web::http::StatusCode;
use crypto_payment_engine::{test_utils::fakes::MERCHANT_SOLANA_WALLET, PriceOracleError};
use rust_decimal_macros::dec;

use super::{
    helpers::{json, TestServer},
    mocks::{MockExplorer, MockPriceFeed},
};

#[actix_web::test]
async fn health_check() {
    let server = TestServer::new(MockPriceFeed::new(), MockExplorer::new()).await;
    let (status, body) = server.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
    server.tear_down().await;
}

#[actix_web::test]
async fn fetch_active_product() {
    let server = TestServer::new(MockPriceFeed::new(), MockExplorer::new()).await;
    let product = server.add_product(dec!(19.99), true).await;
    let (status, body) = server.get(&format!("/products/{}", product.id)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["id"], product.id.0);
    assert_eq!(body["name"], "Gadget");
    assert_eq!(body["priceUsd"], "19.99");
    assert_eq!(body["chain"], "solana");
    assert_eq!(body["currency"], "SOL");
    assert_eq!(body["recipientWallet"], MERCHANT_SOLANA_WALLET);
    assert_eq!(body["isActive"], true);
    server.tear_down().await;
}

#[actix_web::test]
async fn inactive_and_missing_products_are_not_found() {
    let server = TestServer::new(MockPriceFeed::new(), MockExplorer::new()).await;
    let product = server.add_product(dec!(5), false).await;
    let (status, body) = server.get(&format!("/products/{}", product.id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json(&body)["error"].as_str().unwrap().contains("does not exist"));
    let (status, _) = server.get("/products/424242").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    server.tear_down().await;
}

#[actix_web::test]
async fn current_price() {
    let mut oracle = MockPriceFeed::new();
    oracle.expect_fetch_price().withf(|asset| asset == "ETH").times(1).returning(|_| Ok(dec!(3120.55)));
    let server = TestServer::new(oracle, MockExplorer::new()).await;
    let (status, body) = server.get("/price/eth").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["asset"], "ETH");
    assert_eq!(body["usdPrice"], "3120.55");
    server.tear_down().await;
}

#[actix_web::test]
async fn price_of_unlisted_asset() {
    let mut oracle = MockPriceFeed::new();
    oracle.expect_fetch_price().returning(|asset| Err(PriceOracleError::UnsupportedAsset(asset.to_string())));
    let server = TestServer::new(oracle, MockExplorer::new()).await;
    let (status, _) = server.get("/price/NOPE").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    server.tear_down().await;
}
