use std::time::Duration;

use actix_web::http::StatusCode;
use chrono::Utc;
use cpg_common::Chain;
use crypto_payment_engine::{
    db_types::{ChainTransaction, PaymentId, PaymentStatus},
    test_utils::fakes::{eventually, BUYER_SOLANA_WALLET, MERCHANT_SOLANA_WALLET},
    ChainQueryError,
    PaymentGatewayDatabase,
    PriceOracleError,
};
use rust_decimal_macros::dec;
use serde_json::json;

use super::{
    helpers::{json, TestServer},
    mocks::{MockExplorer, MockPriceFeed},
};

fn oracle_at(price: rust_decimal::Decimal) -> MockPriceFeed {
    let mut oracle = MockPriceFeed::new();
    oracle.expect_fetch_price().returning(move |_| Ok(price));
    oracle
}

fn quiet_explorer() -> MockExplorer {
    let mut explorer = MockExplorer::new();
    explorer.expect_find_matching().returning(|_, _, _| Ok(vec![]));
    explorer
}

/// A finalized transfer of `amount` SOL from the buyer to the merchant, stamped a little in the future so that it
/// postdates payments created after the mock is built.
fn settled_transfer(hash: &str, amount: rust_decimal::Decimal) -> ChainTransaction {
    ChainTransaction {
        hash: hash.to_string(),
        from_address: BUYER_SOLANA_WALLET.to_string(),
        to_address: MERCHANT_SOLANA_WALLET.to_string(),
        amount,
        asset: "SOL".to_string(),
        confirmations: 32,
        observed_at: Utc::now() + chrono::Duration::seconds(5),
    }
}

#[actix_web::test]
async fn create_payment_quotes_expected_amount() {
    let server = TestServer::new(oracle_at(dec!(20)), quiet_explorer()).await;
    let product = server.add_product(dec!(10), true).await;
    let (status, body) = server
        .post(
            "/payments/create",
            json!({ "productId": product.id, "buyerEmail": "buyer@example.com", "buyerWallet": BUYER_SOLANA_WALLET }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["expectedAmount"], "0.5");
    assert_eq!(body["displayAmount"], "0.5");
    assert_eq!(body["priceQuote"], "20");
    assert_eq!(body["asset"], "SOL");
    assert_eq!(body["chain"], "solana");
    assert_eq!(body["recipientWallet"], MERCHANT_SOLANA_WALLET);
    let id = body["paymentId"].as_str().expect("paymentId is missing").parse::<PaymentId>().unwrap();
    assert!(server.scheduler().is_polling(&id));
    let payments = server.db.fetch_payments_for_product(product.id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Pending);
    server.tear_down().await;
}

#[actix_web::test]
async fn create_payment_rejects_invalid_wallet() {
    let mut oracle = MockPriceFeed::new();
    oracle.expect_fetch_price().never();
    let server = TestServer::new(oracle, quiet_explorer()).await;
    let product = server.add_product(dec!(10), true).await;
    let (status, body) = server
        .post(
            "/payments/create",
            json!({ "productId": product.id, "buyerEmail": "buyer@example.com", "buyerWallet": "0xde709f2102306220921060314715629080e2fb77" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].as_str().unwrap().contains("is not a valid solana wallet address"));
    assert!(server.db.fetch_payments_for_product(product.id).await.unwrap().is_empty());
    server.tear_down().await;
}

#[actix_web::test]
async fn create_payment_for_unknown_or_inactive_product() {
    let server = TestServer::new(oracle_at(dec!(20)), quiet_explorer()).await;
    let params = |id: i64| json!({ "productId": id, "buyerEmail": "buyer@example.com", "buyerWallet": BUYER_SOLANA_WALLET });
    let (status, _) = server.post("/payments/create", params(9999)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let inactive = server.add_product(dec!(10), false).await;
    let (status, body) = server.post("/payments/create", params(inactive.id.0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].as_str().unwrap().contains("not available for purchase"));
    server.tear_down().await;
}

#[actix_web::test]
async fn create_payment_with_malformed_body() {
    let server = TestServer::new(oracle_at(dec!(20)), quiet_explorer()).await;
    let (status, body) = server.post_raw("/payments/create", r#"{"productId": "one""#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].as_str().unwrap().starts_with("Could not read request body"));
    server.tear_down().await;
}

#[actix_web::test]
async fn create_payment_without_a_price() {
    let mut oracle = MockPriceFeed::new();
    oracle.expect_fetch_price().times(2).returning(|_| Err(PriceOracleError::Transport("connection reset".into())));
    let server = TestServer::new(oracle, quiet_explorer()).await;
    let product = server.add_product(dec!(10), true).await;
    let (status, body) = server
        .post(
            "/payments/create",
            json!({ "productId": product.id, "buyerEmail": "buyer@example.com", "buyerWallet": BUYER_SOLANA_WALLET }),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{body}");
    assert!(server.db.fetch_payments_for_product(product.id).await.unwrap().is_empty());
    server.tear_down().await;
}

#[actix_web::test]
async fn verify_payment_confirms_once() {
    let mut explorer = MockExplorer::new();
    let tx = settled_transfer("sig-confirm", dec!(0.5005));
    explorer
        .expect_find_matching()
        .withf(|chain, recipient, _| *chain == Chain::Solana && recipient.to_string() == MERCHANT_SOLANA_WALLET)
        .returning(move |_, _, _| Ok(vec![tx.clone()]));
    let server = TestServer::new(oracle_at(dec!(20)), explorer).await;
    let product = server.add_product(dec!(10), true).await;
    let payment = server.add_payment(&product).await;

    let (status, body) = server.post("/verify-payment", json!({ "paymentId": payment.id })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "Confirmed");
    assert_eq!(body["txHash"], "sig-confirm");

    // Verifying again reports the same result and notifies no one
    let (status, body) = server.post("/verify-payment", json!({ "paymentId": payment.id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["success"], true);
    assert!(eventually(Duration::from_secs(2), || server.notifier.sent().len() == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.notifier.sent().len(), 1);

    let (status, body) = server.post("/send-confirmation", json!({ "paymentId": payment.id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["sent"], false);
    assert_eq!(server.notifier.sent().len(), 1);
    let stored = server.payment(&payment).await;
    assert_eq!(stored.status, PaymentStatus::Confirmed);
    assert_eq!(stored.expected_crypto_amount, dec!(0.5));
    server.tear_down().await;
}

#[actix_web::test]
async fn verify_payment_without_a_transfer() {
    let server = TestServer::new(oracle_at(dec!(20)), quiet_explorer()).await;
    let product = server.add_product(dec!(10), true).await;
    let payment = server.add_payment(&product).await;
    let (status, body) = server.post("/verify-payment", json!({ "paymentId": payment.id })).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["success"], false);
    assert_eq!(body["status"], "Pending");
    // A manual check is not a poll attempt
    assert_eq!(server.payment(&payment).await.attempt_count, 0);
    let (_, body) = server.post("/send-confirmation", json!({ "paymentId": payment.id })).await;
    assert_eq!(json(&body)["sent"], false);
    server.tear_down().await;
}

#[actix_web::test]
async fn verify_payment_ignores_short_transfers() {
    let mut explorer = MockExplorer::new();
    let tx = settled_transfer("sig-short", dec!(0.49));
    explorer.expect_find_matching().returning(move |_, _, _| Ok(vec![tx.clone()]));
    let server = TestServer::new(oracle_at(dec!(20)), explorer).await;
    let product = server.add_product(dec!(10), true).await;
    let payment = server.add_payment(&product).await;
    let (_, body) = server.post("/verify-payment", json!({ "paymentId": payment.id })).await;
    assert_eq!(json(&body)["success"], false);
    assert_eq!(server.payment(&payment).await.status, PaymentStatus::Pending);
    server.tear_down().await;
}

#[actix_web::test]
async fn verify_unknown_payment() {
    let server = TestServer::new(oracle_at(dec!(20)), quiet_explorer()).await;
    let (status, body) = server.post("/verify-payment", json!({ "paymentId": PaymentId::random() })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json(&body)["error"].as_str().unwrap().contains("does not exist"));
    let (status, _) = server.post("/send-confirmation", json!({ "paymentId": PaymentId::random() })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    server.tear_down().await;
}

#[actix_web::test]
async fn verify_payment_when_the_chain_is_unreachable() {
    let mut explorer = MockExplorer::new();
    explorer.expect_find_matching().returning(|chain, _, _| {
        Err(ChainQueryError::Unreachable { chain, reason: "connection refused".into() })
    });
    let server = TestServer::new(oracle_at(dec!(20)), explorer).await;
    let product = server.add_product(dec!(10), true).await;
    let payment = server.add_payment(&product).await;
    let (status, body) = server.post("/verify-payment", json!({ "paymentId": payment.id })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json(&body)["error"].as_str().unwrap().contains("connection refused"));
    assert_eq!(server.payment(&payment).await.status, PaymentStatus::Pending);
    server.tear_down().await;
}

#[actix_web::test]
async fn fetch_payment_records() {
    let server = TestServer::new(oracle_at(dec!(25)), quiet_explorer()).await;
    let product = server.add_product(dec!(10), true).await;
    let payment = server.add_payment(&product).await;
    let _other = server.add_payment(&product).await;

    let (status, body) = server.get(&format!("/payments/{}", payment.id)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["id"], payment.id.to_string());
    assert_eq!(body["expectedAmount"], "0.4");
    assert_eq!(body["status"], "Pending");

    let (status, body) = server.get(&format!("/payments/product/{}", product.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body).as_array().unwrap().len(), 2);

    let (status, _) = server.get("/payments/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = server.get(&format!("/payments/{}", PaymentId::random())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    server.tear_down().await;
}
