use std::sync::Arc;

use cucumber::World;
use log::*;
use marketpay_engine::{
    db_types::{Order, Payment},
    events::EventProducers,
    test_utils::{
        fake_provider::FakeProvider,
        prepare_env::{create_database, drop_database, random_db_path, run_migrations},
    },
    OrderFlowApi,
    PaymentFlowApi,
    PaymentFlowError,
    PaymentGatewayDatabase,
    ProviderRegistry,
    SqliteDatabase,
    WebhookOutcome,
};
use tokio::time::sleep;

pub const PROVIDERS: [&str; 3] = ["NICEPAY", "TOSS", "STRIPE"];

#[derive(Default, Debug, World)]
pub struct MarketplaceWorld {
    pub system: Option<MarketplaceSystem>,
    pub order: Option<Order>,
    pub payment: Option<Payment>,
    pub last_error: Option<PaymentFlowError>,
    pub webhook_result: Option<Result<WebhookOutcome, PaymentFlowError>>,
    /// The error code of the last cancellation, if it failed.
    pub cancel_result: Option<Result<(), &'static str>>,
}

pub struct MarketplaceSystem {
    pub db_path: String,
    pub providers: Vec<Arc<FakeProvider>>,
    pub payments: PaymentFlowApi<SqliteDatabase>,
    pub orders: OrderFlowApi<SqliteDatabase>,
}

impl std::fmt::Debug for MarketplaceSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MarketplaceSystem ({})", self.db_path)
    }
}

impl MarketplaceWorld {
    pub fn system(&self) -> &MarketplaceSystem {
        self.system.as_ref().expect("System not initialised")
    }

    pub fn order(&self) -> &Order {
        self.order.as_ref().expect("No order has been placed")
    }

    pub fn payment(&self) -> &Payment {
        self.payment.as_ref().expect("No payment has been created")
    }

    pub fn provider(&self, tag: &str) -> Arc<FakeProvider> {
        let tag = tag.to_ascii_uppercase();
        let system = self.system();
        PROVIDERS
            .iter()
            .position(|p| *p == tag)
            .map(|i| Arc::clone(&system.providers[i]))
            .unwrap_or_else(|| panic!("{tag} is not a test provider"))
    }
}

impl MarketplaceSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        sleep(std::time::Duration::from_millis(50)).await;
        let providers = PROVIDERS.iter().map(|tag| Arc::new(FakeProvider::new(tag))).collect::<Vec<_>>();
        let registry = providers.iter().fold(ProviderRegistry::new(), |r, p| r.with_provider(p.clone()));
        let producers = EventProducers::default();
        let payments = PaymentFlowApi::new(db.clone(), registry, producers.clone());
        let orders = OrderFlowApi::new(db, producers);
        Self { db_path: url, providers, payments, orders }
    }

    /// Closes the connection pool and deletes the scenario's database.
    pub async fn tear_down(mut self) {
        if let Err(e) = self.payments.db_mut().close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        drop_database(&self.db_path).await;
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
