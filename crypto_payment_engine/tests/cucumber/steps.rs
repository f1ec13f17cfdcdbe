use std::time::Duration;

use cucumber::{given, then, when};
use crypto_payment_engine::{
    db_types::{FailureReason, PaymentStatus},
    test_utils::fakes::{eventually, sol_transfer, BUYER_SOLANA_WALLET, MERCHANT_SOLANA_WALLET, OTHER_SOLANA_WALLET},
    SchedulerConfig,
    TransitionOutcome,
};
use rust_decimal::Decimal;

use crate::cucumber::PaymentWorld;

const WAIT: Duration = Duration::from_secs(5);

fn decimal(s: &str) -> Decimal {
    s.parse().expect("Not a decimal number")
}

#[given(expr = "{word} is trading at {word} USD")]
async fn asset_price(world: &mut PaymentWorld, _asset: String, price: String) {
    let price = decimal(&price);
    world.init(price).await;
    world.system().oracle.set_price(price);
}

#[when(expr = "{word} starts trading at {word} USD")]
async fn price_changes(world: &mut PaymentWorld, _asset: String, price: String) {
    world.system().oracle.set_price(decimal(&price));
}

#[given(expr = "a solana product priced at {word} USD")]
async fn solana_product(world: &mut PaymentWorld, price: String) {
    world.init(Decimal::ONE).await;
    let product = world.system().add_solana_product(decimal(&price)).await;
    world.product = Some(product);
}

#[given(expr = "the scheduler gives up after {int} attempts")]
async fn max_attempts(world: &mut PaymentWorld, attempts: u32) {
    world.config = Some(SchedulerConfig { max_attempts: attempts, ..world.config() });
}

#[when("the buyer creates a payment for the product")]
async fn create_payment(world: &mut PaymentWorld) {
    let product = world.product().clone();
    let payment = world.system().create_solana_payment(&product).await;
    world.payment = Some(payment);
}

#[when(expr = "the buyer sends {word} SOL with {int} confirmations")]
async fn buyer_sends(world: &mut PaymentWorld, amount: String, confirmations: u64) {
    send(world, BUYER_SOLANA_WALLET, &amount, confirmations);
}

#[when(expr = "someone else sends {word} SOL with {int} confirmations")]
async fn someone_else_sends(world: &mut PaymentWorld, amount: String, confirmations: u64) {
    send(world, OTHER_SOLANA_WALLET, &amount, confirmations);
}

fn send(world: &mut PaymentWorld, from: &str, amount: &str, confirmations: u64) {
    let hash = format!("sig-{}", rand::random::<u32>());
    let tx = sol_transfer(&hash, from, MERCHANT_SOLANA_WALLET, decimal(amount), confirmations);
    world.system().watcher.add_transaction(tx);
    world.last_tx_hash = Some(hash);
}

#[when(expr = "the transaction reaches {int} confirmations")]
async fn transaction_confirms(world: &mut PaymentWorld, confirmations: u64) {
    let hash = world.last_tx_hash.clone().expect("No transaction has been sent");
    world.system().watcher.set_confirmations(&hash, confirmations);
}

#[when("the scheduler starts polling the payment")]
async fn start_polling(world: &mut PaymentWorld) {
    let id = world.payment().id;
    world.scheduler().start(id);
}

#[when(expr = "the scheduler has polled {int} times")]
async fn polled(world: &mut PaymentWorld, times: usize) {
    let watcher = world.system().watcher.clone();
    assert!(eventually(WAIT, || watcher.calls() >= times).await, "The scheduler did not poll {times} times");
}

#[when("the payment is confirmed again")]
async fn confirm_again(world: &mut PaymentWorld) {
    let payment = world.payment().clone();
    let hash = world.last_tx_hash.clone().unwrap_or_else(|| "another-tx".to_string());
    let outcome = world.system().flow.request_confirm(&payment.id, &hash).await.expect("Error confirming payment");
    assert!(matches!(outcome, TransitionOutcome::AlreadyApplied(_)), "Unexpected outcome: {outcome:?}");
}

#[then(expr = "the expected amount is {word} SOL")]
async fn expected_amount(world: &mut PaymentWorld, amount: String) {
    let stored = world.system().payment(world.payment()).await;
    assert_eq!(stored.expected_crypto_amount, decimal(&amount));
}

#[then(expr = "the payment is {word}")]
async fn payment_status(world: &mut PaymentWorld, status: String) {
    let status = status.parse::<PaymentStatus>().expect("Not a payment status");
    let deadline = tokio::time::Instant::now() + WAIT;
    let mut current = world.system().payment(world.payment()).await;
    while current.status != status && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
        current = world.system().payment(world.payment()).await;
    }
    assert_eq!(current.status, status);
    world.payment = Some(current);
}

#[then(expr = "the payment is still {word}")]
async fn payment_still(world: &mut PaymentWorld, status: String) {
    let current = world.system().payment(world.payment()).await;
    assert_eq!(current.status.to_string(), status);
}

#[then(expr = "the failure reason is {word}")]
async fn failure_reason(world: &mut PaymentWorld, reason: String) {
    let reason = reason.parse::<FailureReason>().expect("Not a failure reason");
    assert_eq!(world.payment().failure_reason, Some(reason));
}

#[then(expr = "the payment was polled {int} times")]
async fn poll_attempts(world: &mut PaymentWorld, expected: i64) {
    let stored = world.system().payment(world.payment()).await;
    assert_eq!(stored.attempt_count, expected);
}

#[then(expr = "{int} confirmation notification(s) is/are sent")]
async fn notifications(world: &mut PaymentWorld, count: usize) {
    let notifier = world.system().notifier.clone();
    eventually(WAIT, || notifier.sent().len() >= count).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(notifier.sent().len(), count);
}
