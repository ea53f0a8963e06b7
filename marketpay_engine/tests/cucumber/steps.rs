use std::str::FromStr;

use cucumber::{given, then, when};
use marketpay_engine::{
    db_types::{
        CanonicalStatus,
        Money,
        NewOrder,
        NewPayment,
        OrderStatusType,
        Pagination,
        PaymentMethod,
        PaymentStatus,
        ProviderTag,
    },
    gateway::ProviderError,
    WebhookOutcome,
};

use crate::cucumber::{world::MarketplaceSystem, MarketplaceWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut MarketplaceWorld) {
    let system = MarketplaceSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "buyer {int} has placed an order with seller {int} for {word} {word}")]
async fn place_order(world: &mut MarketplaceWorld, buyer: i64, seller: i64, total: String, currency: String) {
    let total = Money::from_str(&total).expect("Not a valid amount");
    let order = NewOrder::new(buyer, seller, total).with_currency(currency);
    let order = world.system().orders.create_order(order).await.expect("Error placing order");
    world.order = Some(order);
}

#[when(expr = "I create a {word} payment of {word} via {word}")]
async fn create_payment(world: &mut MarketplaceWorld, method: String, amount: String, provider: String) {
    let method = match method.to_ascii_lowercase().as_str() {
        "card" => PaymentMethod::Card,
        "bank" => PaymentMethod::BankTransfer,
        "paypal" => PaymentMethod::Paypal,
        "stripe" => PaymentMethod::Stripe,
        m => panic!("Unknown payment method {m}"),
    };
    let amount = Money::from_str(&amount).expect("Not a valid amount");
    let order = world.order();
    let payment = NewPayment::new(order.id, amount, method, ProviderTag::new(provider))
        .with_currency(order.currency.clone());
    match world.system().payments.create_payment(payment).await {
        Ok(p) => {
            world.payment = Some(p);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "{word} confirms the payment as transaction [{word}]")]
async fn confirm_payment(world: &mut MarketplaceWorld, _provider: String, txn_id: String) {
    let id = world.payment().id;
    match world.system().payments.confirm_payment(id, &txn_id).await {
        Ok(p) => {
            world.payment = Some(p);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "{word} registers the payment")]
async fn register_payment(world: &mut MarketplaceWorld, _provider: String) {
    let id = world.payment().id;
    match world.system().payments.create_provider_intent(id).await {
        Ok(intent) => {
            world.payment = Some(intent.payment);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "the buyer cancels the order")]
async fn buyer_cancels(world: &mut MarketplaceWorld) {
    let order = world.order();
    let result = world.system().orders.cancel_as_buyer(order.id, order.buyer_id).await;
    world.cancel_result = Some(result.map(|_| ()).map_err(|e| e.code()));
}

#[then(expr = "the cancellation fails with {word}")]
async fn cancellation_fails(world: &mut MarketplaceWorld, code: String) {
    match world.cancel_result.as_ref().expect("No cancellation was attempted") {
        Err(actual) => assert_eq!(*actual, code.as_str()),
        Ok(()) => panic!("The order was cancelled"),
    }
}

#[then(expr = "the notification is applied")]
async fn notification_applied(world: &mut MarketplaceWorld) {
    match world.webhook_result.as_ref().expect("No notification was delivered") {
        Ok(WebhookOutcome::Applied(_)) => {},
        other => panic!("Expected the notification to be applied, got {other:?}"),
    }
}

#[when(expr = "{word} declines the next confirmation with code {word}")]
async fn decline_next(world: &mut MarketplaceWorld, provider: String, code: String) {
    world.provider(&provider).fail_confirmations(ProviderError::Declined {
        code,
        message: "Card declined".into(),
        raw: None,
    });
}

#[when(expr = "I refund the payment because {string}")]
async fn refund_payment(world: &mut MarketplaceWorld, reason: String) {
    let id = world.payment().id;
    match world.system().payments.refund_payment(id, &reason).await {
        Ok(p) => {
            world.payment = Some(p);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "the provider reports {word} for transaction [{word}]")]
async fn provider_reports(world: &mut MarketplaceWorld, status: String, txn_id: String) {
    let status = CanonicalStatus::from_str(&status).expect("Not a canonical status");
    let result = world.system().payments.apply_webhook_status(&txn_id, status).await;
    world.webhook_result = Some(result);
}

#[then(expr = "the request fails with {word}")]
async fn request_fails(world: &mut MarketplaceWorld, code: String) {
    let err = world.last_error.as_ref().expect("The last request succeeded");
    assert_eq!(err.code(), code, "Unexpected error: {err}");
}

#[then(expr = "the payment is {word}")]
async fn payment_status(world: &mut MarketplaceWorld, status: String) {
    let expected = PaymentStatus::from_str(&status).expect("Not a payment status");
    let id = world.payment().id;
    let payment = world.system().payments.payment_by_id(id).await.expect("Error fetching payment");
    let payment = payment.expect("Payment does not exist");
    assert_eq!(payment.status, expected);
}

#[then(expr = "the payment carries transaction [{word}]")]
async fn payment_txn(world: &mut MarketplaceWorld, txn_id: String) {
    let payment = world.system().payments.payment_by_external_txn_id(&txn_id).await.expect("Error fetching payment");
    let payment = payment.expect("No payment carries the transaction id");
    assert_eq!(payment.id, world.payment().id);
}

#[then(expr = "the order is {word}")]
async fn order_status(world: &mut MarketplaceWorld, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Not an order status");
    let id = world.order().id;
    let order = world.system().orders.order_by_id(id).await.expect("Error fetching order");
    assert_eq!(order.expect("Order does not exist").status, expected);
}

#[then(expr = "the order has {int} payment(s)")]
async fn payment_count(world: &mut MarketplaceWorld, count: usize) {
    let id = world.order().id;
    let payments =
        world.system().payments.payments_for_order(id, Pagination::default()).await.expect("Error fetching payments");
    assert_eq!(payments.len(), count);
}

#[then(expr = "{word} was asked to refund {int} time(s)")]
async fn cancel_count(world: &mut MarketplaceWorld, provider: String, count: usize) {
    assert_eq!(world.provider(&provider).cancel_calls(), count);
}

#[then(expr = "the notification fails with {word}")]
async fn notification_fails(world: &mut MarketplaceWorld, code: String) {
    match world.webhook_result.as_ref().expect("No notification was delivered") {
        Err(e) => assert_eq!(e.code(), code, "Unexpected error: {e}"),
        Ok(outcome) => panic!("The notification was accepted: {outcome:?}"),
    }
}

#[then(expr = "the notification changes nothing")]
async fn notification_unchanged(world: &mut MarketplaceWorld) {
    match world.webhook_result.as_ref().expect("No notification was delivered") {
        Ok(WebhookOutcome::Unchanged(_)) | Ok(WebhookOutcome::Ignored(_)) => {},
        other => panic!("Expected no change, got {other:?}"),
    }
}
