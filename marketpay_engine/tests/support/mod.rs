#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use log::*;
use marketpay_engine::{
    db_types::{Money, NewOrder, NewPayment, Order, Payment, PaymentMethod, ProviderTag},
    events::EventProducers,
    test_utils::{
        fake_provider::FakeProvider,
        prepare_env::{drop_database, prepare_test_env, random_db_path},
    },
    OrderFlowApi,
    PaymentFlowApi,
    PaymentGatewayDatabase,
    ProviderRegistry,
    SqliteDatabase,
};

pub const PROVIDER: &str = "TOSS";
pub const BUYER: i64 = 100;
pub const SELLER: i64 = 200;

pub struct TestSystem {
    pub url: String,
    pub provider: Arc<FakeProvider>,
    pub payments: PaymentFlowApi<SqliteDatabase>,
    pub orders: OrderFlowApi<SqliteDatabase>,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_provider(FakeProvider::new(PROVIDER), EventProducers::default()).await
    }

    pub async fn with_provider(provider: FakeProvider, producers: EventProducers) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let provider = Arc::new(provider);
        let registry = ProviderRegistry::new().with_provider(provider.clone());
        let payments = PaymentFlowApi::new(db.clone(), registry, producers.clone())
            .with_provider_timeout(Duration::from_millis(500));
        let orders = OrderFlowApi::new(db, producers);
        Self { url, provider, payments, orders }
    }

    pub async fn place_order(&self, total: Money) -> Order {
        let order = NewOrder::new(BUYER, SELLER, total);
        self.orders.create_order(order).await.expect("Error creating order")
    }

    pub fn new_payment(&self, order: &Order, amount: Money) -> NewPayment {
        NewPayment::new(order.id, amount, PaymentMethod::Card, ProviderTag::new(PROVIDER))
    }

    /// An order with a completed payment, confirmed under the transaction id `txn_id`.
    pub async fn completed_payment(&self, total: Money, txn_id: &str) -> (Order, Payment) {
        let order = self.place_order(total).await;
        let payment = self.payments.create_payment(self.new_payment(&order, total)).await.expect("Error creating payment");
        let payment = self.payments.confirm_payment(payment.id, txn_id).await.expect("Error confirming payment");
        let order = self.orders.order_by_id(order.id).await.unwrap().unwrap();
        (order, payment)
    }

    pub async fn tear_down(mut self) {
        if let Err(e) = self.payments.db_mut().close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        drop_database(&self.url).await;
    }
}
