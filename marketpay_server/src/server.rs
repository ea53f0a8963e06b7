use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, web::ServiceConfig, App, HttpServer};
use gateway_clients::{NicePayClient, StripeClient, TossClient};
use log::*;
use marketpay_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    OrderFlowApi,
    PaymentFlowApi,
    PaymentGatewayDatabase,
    ProviderRegistry,
    SqliteDatabase,
};

use crate::{
    config::{ProviderConfig, ServerConfig},
    errors::ServerError,
    routes::{
        health,
        CancelOrderRoute,
        CreateOrderRoute,
        CreatePaymentRoute,
        OrderByIdRoute,
        PaymentByIdRoute,
        PaymentByTransactionRoute,
        PaymentIntentRoute,
        PaymentsForOrderRoute,
        ProcessPaymentRoute,
        ProviderStatusRoute,
        RefundPaymentRoute,
        SearchOrdersRoute,
        UpdateOrderStatusRoute,
    },
    webhook_routes::PaymentWebhookRoute,
};

const EVENT_BUFFER_SIZE: usize = 64;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.run_migrations {
        db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    }
    let registry = build_provider_registry(&config.providers)?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, logging_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, registry, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Creates an adapter for every provider that has credentials configured.
pub fn build_provider_registry(config: &ProviderConfig) -> Result<ProviderRegistry, ServerError> {
    let mut registry = ProviderRegistry::new();
    if let Some(nicepay) = &config.nicepay {
        let client = NicePayClient::new(nicepay.clone()).map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
        registry.register(Arc::new(client));
    }
    if let Some(toss) = &config.toss {
        let client = TossClient::new(toss.clone()).map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
        registry.register(Arc::new(client));
    }
    if let Some(stripe) = &config.stripe {
        let client = StripeClient::new(stripe.clone()).map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
        registry.register(Arc::new(client));
    }
    info!("💻️ Payment providers available: {registry:?}");
    Ok(registry)
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    registry: ProviderRegistry,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let provider_timeout = config.provider_timeout;
    let webhook_config = web::Data::new(config.webhooks.clone());
    let srv = HttpServer::new(move || {
        let payments_api = PaymentFlowApi::new(db.clone(), registry.clone(), producers.clone())
            .with_provider_timeout(provider_timeout);
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mpg::access_log"))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(orders_api))
            .app_data(webhook_config.clone())
            .service(health)
            .configure(configure_routes::<SqliteDatabase>)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers the order, payment and webhook routes. The APIs they use must already be in the app data.
///
/// More specific paths are registered ahead of the `/payments/{id}` family so that they are matched first.
pub fn configure_routes<B>(cfg: &mut ServiceConfig)
where B: PaymentGatewayDatabase + 'static {
    cfg.service(PaymentWebhookRoute::<B>::new())
        .service(PaymentsForOrderRoute::<B>::new())
        .service(PaymentByTransactionRoute::<B>::new())
        .service(CreatePaymentRoute::<B>::new())
        .service(PaymentIntentRoute::<B>::new())
        .service(ProcessPaymentRoute::<B>::new())
        .service(RefundPaymentRoute::<B>::new())
        .service(ProviderStatusRoute::<B>::new())
        .service(PaymentByIdRoute::<B>::new())
        .service(CreateOrderRoute::<B>::new())
        .service(SearchOrdersRoute::<B>::new())
        .service(OrderByIdRoute::<B>::new())
        .service(UpdateOrderStatusRoute::<B>::new())
        .service(CancelOrderRoute::<B>::new());
}

/// Event hooks that write payment and order changes to the log.
pub fn logging_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_payment_completed(|ev| {
            Box::pin(async move {
                info!("📬️ Payment {} for order {} completed", ev.payment.id, ev.order.id);
            })
        })
        .on_payment_failed(|ev| {
            Box::pin(async move {
                info!("📬️ Payment {} for order {} failed. {}", ev.payment.id, ev.payment.order_id, ev.reason);
            })
        })
        .on_payment_refunded(|ev| {
            Box::pin(async move {
                info!("📬️ Payment {} for order {} refunded", ev.payment.id, ev.order.id);
            })
        })
        .on_order_status_changed(|ev| {
            Box::pin(async move {
                info!("📬️ Order {} changed from {} to {}", ev.order.id, ev.old_status, ev.order.status);
            })
        });
    hooks
}
