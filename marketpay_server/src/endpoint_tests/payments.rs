use actix_web::{http::StatusCode, test::TestRequest};
use marketpay_engine::gateway::ProviderError;
use serde_json::json;

use super::{
    helpers::{payment_request, TestServer},
    mocks::{happy_provider, intent_provider, provider},
};

#[actix_web::test]
async fn create_process_and_refund() {
    let server = TestServer::new(happy_provider("TOSS")).await;
    let order_id = server.new_order(1, 2, "50000").await;
    let payment_id = server.new_payment(order_id, "50000", "toss").await;

    let (status, payment) = server.get(&format!("/payments/{payment_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["status"], "PENDING");
    assert_eq!(payment["pgProvider"], "TOSS");
    assert_eq!(payment["paymentMethod"], "CARD");

    let (status, payment) =
        server.post(&format!("/payments/{payment_id}/process"), json!({"pgTransactionId": "pk_123"})).await;
    assert_eq!(status, StatusCode::OK, "{payment}");
    assert_eq!(payment["status"], "COMPLETED");
    assert_eq!(payment["pgTransactionId"], "pk_123");
    let (_, order) = server.get(&format!("/orders/{order_id}")).await;
    assert_eq!(order["status"], "CONFIRMED");

    let (status, payment) = server.get("/payments/transaction/pk_123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["id"], payment_id);

    let (status, body) =
        server.post(&format!("/payments/{payment_id}/process"), json!({"pgTransactionId": "pk_123"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_PROCESSED");

    let refund = TestRequest::post().uri(&format!("/payments/{payment_id}/refund?reason=Changed%20my%20mind"));
    let (status, payment) = server.send(refund).await;
    assert_eq!(status, StatusCode::OK, "{payment}");
    assert_eq!(payment["status"], "REFUNDED");
    let (_, order) = server.get(&format!("/orders/{order_id}")).await;
    assert_eq!(order["status"], "CANCELLED");

    let (status, body) = server.send(TestRequest::post().uri(&format!("/payments/{payment_id}/refund"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");
    server.tear_down().await;
}

#[actix_web::test]
async fn payments_must_match_the_order_total() {
    let server = TestServer::new(provider("TOSS")).await;
    let order_id = server.new_order(1, 2, "50000").await;
    let (status, body) = server.post("/payments", payment_request(order_id, "49999", "TOSS")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "AMOUNT_MISMATCH");
    let (_, payments) = server.get(&format!("/payments/order/{order_id}")).await;
    assert_eq!(payments, json!([]));
    server.tear_down().await;
}

#[actix_web::test]
async fn only_one_active_payment_per_order() {
    let server = TestServer::new(provider("TOSS")).await;
    let order_id = server.new_order(1, 2, "12000").await;
    server.new_payment(order_id, "12000", "TOSS").await;
    let (status, body) = server.post("/payments", payment_request(order_id, "12000", "TOSS")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DUPLICATE_PAYMENT");
    let (status, payments) = server.get(&format!("/payments/order/{order_id}?page=0&pageSize=10")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payments.as_array().map(Vec::len), Some(1));
    server.tear_down().await;
}

#[actix_web::test]
async fn unknown_providers_and_orders() {
    let server = TestServer::new(provider("TOSS")).await;
    let order_id = server.new_order(1, 2, "12000").await;
    let (status, body) = server.post("/payments", payment_request(order_id, "12000", "PAYPAL")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UNSUPPORTED_PROVIDER");

    let (status, body) = server.post("/payments", payment_request(9999, "12000", "TOSS")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = server.get("/payments/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = server.get("/payments/transaction/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    server.tear_down().await;
}

#[actix_web::test]
async fn declined_confirmations_fail_the_payment() {
    let mut mock = provider("TOSS");
    mock.expect_confirm().times(1).returning(|_| {
        Err(ProviderError::Declined { code: "REJECT_CARD_COMPANY".into(), message: "Card declined".into(), raw: None })
    });
    let server = TestServer::new(mock).await;
    let order_id = server.new_order(1, 2, "8000").await;
    let payment_id = server.new_payment(order_id, "8000", "TOSS").await;

    let (status, body) =
        server.post(&format!("/payments/{payment_id}/process"), json!({"pgTransactionId": "pk_9"})).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["code"], "CONFIRMATION_FAILED");
    let (_, payment) = server.get(&format!("/payments/{payment_id}")).await;
    assert_eq!(payment["status"], "FAILED");
    let (_, order) = server.get(&format!("/orders/{order_id}")).await;
    assert_eq!(order["status"], "PENDING");

    // A failed payment no longer blocks a new attempt
    server.new_payment(order_id, "8000", "TOSS").await;
    server.tear_down().await;
}

#[actix_web::test]
async fn provider_status_is_read_through() {
    let server = TestServer::new(happy_provider("TOSS")).await;
    let order_id = server.new_order(1, 2, "3000").await;
    let payment_id = server.new_payment(order_id, "3000", "TOSS").await;
    server.post(&format!("/payments/{payment_id}/process"), json!({"pgTransactionId": "pk_77"})).await;

    let (status, body) = server.get(&format!("/payments/{payment_id}/status")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["externalTxnId"], "pk_77");
    assert_eq!(body["nativeStatus"], "DONE");
    server.tear_down().await;
}

#[actix_web::test]
async fn intents_register_the_payment_with_its_provider() {
    let server = TestServer::new(intent_provider("STRIPE")).await;
    let order_id = server.new_order(1, 2, "4999").await;
    let payment_id = server.new_payment(order_id, "4999", "STRIPE").await;
    let uri = format!("/payments/{payment_id}/intent");

    let (status, body) = server.post(&uri, json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let txn_id = format!("pi_{payment_id}");
    assert_eq!(body["clientSecret"], format!("{txn_id}_secret"));
    assert_eq!(body["payment"]["status"], "PENDING");
    assert_eq!(body["payment"]["pgTransactionId"], txn_id);
    let (status, found) = server.get(&format!("/payments/transaction/{txn_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["id"], payment_id);
    assert!(found["pgResponse"].get("client_secret").is_none());

    // One intent per payment
    let (status, body) = server.post(&uri, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");

    // The intent is the only reference the payment can be confirmed with
    let (status, body) =
        server.post(&format!("/payments/{payment_id}/process"), json!({"pgTransactionId": "pi_other"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
    let (status, payment) =
        server.post(&format!("/payments/{payment_id}/process"), json!({"pgTransactionId": txn_id})).await;
    assert_eq!(status, StatusCode::OK, "{payment}");
    assert_eq!(payment["status"], "COMPLETED");
    server.tear_down().await;
}

#[actix_web::test]
async fn providers_without_intents() {
    let server = TestServer::new(happy_provider("TOSS")).await;
    let order_id = server.new_order(1, 2, "1000").await;
    let payment_id = server.new_payment(order_id, "1000", "TOSS").await;
    let (status, body) = server.post(&format!("/payments/{payment_id}/intent"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["code"], "INVALID_REQUEST");
    let (_, payment) = server.get(&format!("/payments/{payment_id}")).await;
    assert_eq!(payment["pgTransactionId"], serde_json::Value::Null);
    server.tear_down().await;
}
