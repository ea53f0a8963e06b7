use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Utc;
use mpg_common::Secret;
use serde_json::{json, Value};

use super::{
    helpers::TestServer,
    mocks::{happy_provider, intent_provider},
};
use crate::{
    config::WebhookConfig,
    webhooks::signatures::{stripe_signature, STRIPE_SIGNATURE_HEADER},
};

fn toss_event(event_type: &str, payment_key: &str, status: &str) -> Value {
    json!({
        "eventType": event_type,
        "createdAt": "2024-05-01T12:00:00",
        "data": {"paymentKey": payment_key, "status": status}
    })
}

/// A completed TOSS payment, returning the order and payment ids.
async fn completed_payment(server: &TestServer, payment_key: &str) -> (i64, i64) {
    let order_id = server.new_order(1, 2, "15000").await;
    let payment_id = server.new_payment(order_id, "15000", "TOSS").await;
    let (status, _) =
        server.post(&format!("/payments/{payment_id}/process"), json!({"pgTransactionId": payment_key})).await;
    assert_eq!(status, StatusCode::OK);
    (order_id, payment_id)
}

#[actix_web::test]
async fn refund_notifications_are_applied() {
    let server = TestServer::new(happy_provider("TOSS")).await;
    let (order_id, payment_id) = completed_payment(&server, "pk_wh_1").await;

    let (status, body) =
        server.post("/payments/webhook/toss", toss_event("PAYMENT_CANCELED", "pk_wh_1", "CANCELED")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true, "{body}");
    let (_, payment) = server.get(&format!("/payments/{payment_id}")).await;
    assert_eq!(payment["status"], "REFUNDED");
    let (_, order) = server.get(&format!("/orders/{order_id}")).await;
    assert_eq!(order["status"], "CANCELLED");

    // Redelivery changes nothing
    let (status, body) =
        server.post("/payments/webhook/toss", toss_event("PAYMENT_CANCELED", "pk_wh_1", "CANCELED")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    server.tear_down().await;
}

#[actix_web::test]
async fn stale_notifications_are_ignored() {
    let server = TestServer::new(happy_provider("TOSS")).await;
    let (_, payment_id) = completed_payment(&server, "pk_wh_2").await;
    let (status, body) =
        server.post("/payments/webhook/toss", toss_event("PAYMENT_STATUS_CHANGED", "pk_wh_2", "ABORTED")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let (_, payment) = server.get(&format!("/payments/{payment_id}")).await;
    assert_eq!(payment["status"], "COMPLETED");
    server.tear_down().await;
}

#[actix_web::test]
async fn unusable_notifications_still_get_a_200() {
    let server = TestServer::new(happy_provider("TOSS")).await;
    let (status, body) =
        server.post("/payments/webhook/toss", toss_event("PAYMENT_CANCELED", "pk_unknown", "CANCELED")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let (status, body) = server.post("/payments/webhook/paypal", json!({"id": "WH-1"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let req = TestRequest::post()
        .uri("/payments/webhook/toss")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json");
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let event = toss_event("DEPOSIT_CALLBACK", "pk_unknown", "WAITING_FOR_DEPOSIT");
    let (status, body) = server.post("/payments/webhook/toss", event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    server.tear_down().await;
}

#[actix_web::test]
async fn signed_stripe_notifications() {
    let config = WebhookConfig { stripe_secret: Some(Secret::new("whsec_test".to_string())), toss_secret: None };
    let server = TestServer::new(happy_provider("TOSS")).await.with_webhook_config(config);
    let event = json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "data": {"object": {"id": "pi_unknown", "object": "payment_intent", "status": "succeeded"}}
    })
    .to_string();

    let req = TestRequest::post()
        .uri("/payments/webhook/stripe")
        .insert_header((STRIPE_SIGNATURE_HEADER, "t=1,v1=00"))
        .set_payload(event.clone());
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap_or_default().contains("signature"), "{body}");

    // A valid signature gets as far as the transaction lookup
    let now = Utc::now().timestamp();
    let sig = stripe_signature("whsec_test", now, event.as_bytes()).unwrap();
    let req = TestRequest::post()
        .uri("/payments/webhook/stripe")
        .insert_header((STRIPE_SIGNATURE_HEADER, format!("t={now},v1={sig}")))
        .set_payload(event);
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap_or_default().contains("pi_unknown"), "{body}");
    server.tear_down().await;
}

#[actix_web::test]
async fn stripe_notifications_complete_registered_payments() {
    let server = TestServer::new(intent_provider("STRIPE")).await;
    let order_id = server.new_order(1, 2, "4999").await;
    let payment_id = server.new_payment(order_id, "4999", "STRIPE").await;
    let (status, _) = server.post(&format!("/payments/{payment_id}/intent"), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let event = json!({
        "id": "evt_2",
        "type": "payment_intent.succeeded",
        "data": {"object": {"id": format!("pi_{payment_id}"), "object": "payment_intent", "status": "succeeded"}}
    });
    let (status, body) = server.post("/payments/webhook/stripe", event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true, "{body}");
    let (_, payment) = server.get(&format!("/payments/{payment_id}")).await;
    assert_eq!(payment["status"], "COMPLETED");
    assert!(payment["paidAt"].is_string(), "{payment}");
    let (_, order) = server.get(&format!("/orders/{order_id}")).await;
    assert_eq!(order["status"], "CONFIRMED");
    server.tear_down().await;
}
