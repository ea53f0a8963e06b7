use actix_web::http::StatusCode;
use serde_json::json;

use super::{helpers::TestServer, mocks::provider};

#[actix_web::test]
async fn place_and_fetch_an_order() {
    let server = TestServer::new(provider("TOSS")).await;
    let (status, order) =
        server.post("/orders", json!({"buyerId": 10, "sellerId": 20, "totalPrice": "25000", "currency": "KRW"})).await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["buyerId"], 10);
    let id = order["id"].as_i64().unwrap();

    let (status, fetched) = server.get(&format!("/orders/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id);
    assert_eq!(fetched["sellerId"], 20);

    let (status, body) = server.get("/orders/4040").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    server.tear_down().await;
}

#[actix_web::test]
async fn sellers_move_their_orders_along() {
    let server = TestServer::new(provider("TOSS")).await;
    let id = server.new_order(10, 20, "25000").await;
    let uri = format!("/orders/{id}/status");

    let (status, body) = server.patch(&uri, json!({"sellerId": 21, "status": "PAID"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = server.patch(&uri, json!({"sellerId": 20, "status": "SHIPPING"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");

    for next in ["PAID", "CONFIRMED", "SHIPPING", "DELIVERED"] {
        let (status, order) = server.patch(&uri, json!({"sellerId": 20, "status": next})).await;
        assert_eq!(status, StatusCode::OK, "{order}");
        assert_eq!(order["status"], next);
    }

    let (status, _) = server.patch(&uri, json!({"sellerId": 20, "status": "CANCELLED"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    server.tear_down().await;
}

#[actix_web::test]
async fn buyers_cancel_their_own_orders() {
    let server = TestServer::new(provider("TOSS")).await;
    let id = server.new_order(10, 20, "25000").await;
    let uri = format!("/orders/{id}/cancel");

    let (status, _) = server.post(&uri, json!({"buyerId": 11})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, order) = server.post(&uri, json!({"buyerId": 10})).await;
    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(order["status"], "CANCELLED");
    let (status, body) = server.post(&uri, json!({"buyerId": 10})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");

    let (status, _) = server.post("/orders/4040/cancel", json!({"buyerId": 10})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    server.tear_down().await;
}

#[actix_web::test]
async fn orders_with_a_pending_payment_are_not_cancelled() {
    let server = TestServer::new(provider("TOSS")).await;
    let id = server.new_order(10, 20, "25000").await;
    server.new_payment(id, "25000", "TOSS").await;
    let (status, body) = server.post(&format!("/orders/{id}/cancel"), json!({"buyerId": 10})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ACTIVE_PAYMENT");
    let (_, order) = server.get(&format!("/orders/{id}")).await;
    assert_eq!(order["status"], "PENDING");
    server.tear_down().await;
}

#[actix_web::test]
async fn search_orders() {
    let server = TestServer::new(provider("TOSS")).await;
    let first = server.new_order(10, 20, "1000").await;
    server.new_order(10, 21, "2000").await;
    server.new_order(11, 20, "3000").await;
    server.post(&format!("/orders/{first}/cancel"), json!({"buyerId": 10})).await;

    let (status, orders) = server.get("/orders?buyerId=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().map(Vec::len), Some(2));

    let (_, orders) = server.get("/orders?sellerId=20&status=PENDING").await;
    let orders = orders.as_array().cloned().unwrap_or_default();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["buyerId"], 11);

    let (_, orders) = server.get("/orders?pageSize=2").await;
    assert_eq!(orders.as_array().map(Vec::len), Some(2));
    let (_, orders) = server.get("/orders?page=1&pageSize=2").await;
    assert_eq!(orders.as_array().map(Vec::len), Some(1));
    server.tear_down().await;
}
