use std::{sync::Arc, time::Duration};

use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use log::debug;
use marketpay_engine::{
    events::EventProducers,
    test_utils::prepare_env::{drop_database, prepare_test_env, random_db_path},
    OrderFlowApi,
    PaymentFlowApi,
    ProviderRegistry,
    SqliteDatabase,
};
use serde_json::{json, Value};

use super::mocks::MockProvider;
use crate::{config::WebhookConfig, routes::health, server::configure_routes};

/// A fresh database and provider set behind the full route table. Every request is served by a newly built app, so
/// state carries over between requests through the database only.
pub struct TestServer {
    url: String,
    db: SqliteDatabase,
    registry: ProviderRegistry,
    webhooks: WebhookConfig,
}

impl TestServer {
    pub async fn new(provider: MockProvider) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        let registry = ProviderRegistry::new().with_provider(Arc::new(provider));
        Self { url, db, registry, webhooks: WebhookConfig::default() }
    }

    pub fn with_webhook_config(mut self, webhooks: WebhookConfig) -> Self {
        self.webhooks = webhooks;
        self
    }

    fn configure(&self, cfg: &mut ServiceConfig) {
        let producers = EventProducers::default();
        let payments = PaymentFlowApi::new(self.db.clone(), self.registry.clone(), producers.clone())
            .with_provider_timeout(Duration::from_secs(5));
        let orders = OrderFlowApi::new(self.db.clone(), producers);
        cfg.app_data(web::Data::new(payments))
            .app_data(web::Data::new(orders))
            .app_data(web::Data::new(self.webhooks.clone()))
            .service(health)
            .configure(configure_routes::<SqliteDatabase>);
    }

    /// Sends the request and returns the status with the body parsed as JSON (`Null` if the body is not JSON).
    pub async fn send(&self, req: TestRequest) -> (StatusCode, Value) {
        let app = test::init_service(App::new().configure(|cfg| self.configure(cfg))).await;
        let res = test::call_service(&app, req.to_request()).await;
        let status = res.status();
        let body = test::read_body(res).await;
        debug!("🚀️ Response {status}: {}", String::from_utf8_lossy(&body));
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(TestRequest::get().uri(uri)).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(TestRequest::post().uri(uri).set_json(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(TestRequest::patch().uri(uri).set_json(body)).await
    }

    /// Places an order and returns its id.
    pub async fn new_order(&self, buyer_id: i64, seller_id: i64, total: &str) -> i64 {
        let body = json!({"buyerId": buyer_id, "sellerId": seller_id, "totalPrice": total, "currency": "KRW"});
        let (status, order) = self.post("/orders", body).await;
        assert_eq!(status, StatusCode::CREATED, "{order}");
        order["id"].as_i64().expect("order id")
    }

    /// Creates a pending payment for the order and returns its id.
    pub async fn new_payment(&self, order_id: i64, amount: &str, provider: &str) -> i64 {
        let (status, payment) = self.post("/payments", payment_request(order_id, amount, provider)).await;
        assert_eq!(status, StatusCode::CREATED, "{payment}");
        payment["id"].as_i64().expect("payment id")
    }

    pub async fn tear_down(self) {
        self.db.pool().close().await;
        drop_database(&self.url).await;
    }
}

pub fn payment_request(order_id: i64, amount: &str, provider: &str) -> Value {
    json!({
        "orderId": order_id,
        "amount": amount,
        "currency": "KRW",
        "paymentMethod": "CARD",
        "pgProvider": provider,
    })
}
