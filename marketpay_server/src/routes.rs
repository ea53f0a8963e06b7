//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use marketpay_engine::{
    db_types::{NewOrder, NewPayment, OrderId, PaymentId},
    OrderFlowApi,
    PaymentFlowApi,
    PaymentGatewayDatabase,
};

use crate::{
    data_objects::{
        CancelOrderRequest,
        OrderSearchParams,
        PageParams,
        ProcessPaymentRequest,
        RefundParams,
        UpdateOrderStatusRequest,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------

route!(create_order => Post "/orders" impl PaymentGatewayDatabase);
/// Places a new order. Orders start out `PENDING`.
pub async fn create_order<B: PaymentGatewayDatabase>(
    body: web::Json<NewOrder>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order = body.into_inner();
    debug!("💻️ POST new order for buyer {} from seller {}", order.buyer_id, order.seller_id);
    let order = api.create_order(order).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(search_orders => Get "/orders" impl PaymentGatewayDatabase);
/// Lists orders, optionally filtered by `buyerId`, `sellerId` and `status`. Results are paged with `page` (zero-based)
/// and `pageSize`.
pub async fn search_orders<B: PaymentGatewayDatabase>(
    query: web::Query<OrderSearchParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    debug!("💻️ GET orders search for {query:?}");
    let orders = api.search_orders(query.filter(), query.pagination()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{id}" impl PaymentGatewayDatabase);
pub async fn order_by_id<B: PaymentGatewayDatabase>(
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    debug!("💻️ GET order {order_id}");
    let order = api
        .order_by_id(order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id} does not exist")))?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order_status => Patch "/orders/{id}/status" impl PaymentGatewayDatabase);
/// Sellers move their orders along, e.g. `{"sellerId": 7, "status": "SHIPPING"}`.
pub async fn update_order_status<B: PaymentGatewayDatabase>(
    path: web::Path<i64>,
    body: web::Json<UpdateOrderStatusRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let UpdateOrderStatusRequest { seller_id, status } = body.into_inner();
    debug!("💻️ PATCH order {order_id} to {status} by seller {seller_id}");
    let order = api.update_status_as_seller(order_id, seller_id, status).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/orders/{id}/cancel" impl PaymentGatewayDatabase);
pub async fn cancel_order<B: PaymentGatewayDatabase>(
    path: web::Path<i64>,
    body: web::Json<CancelOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let buyer_id = body.into_inner().buyer_id;
    debug!("💻️ POST cancel order {order_id} by buyer {buyer_id}");
    let order = api.cancel_as_buyer(order_id, buyer_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Payments  ----------------------------------------------------

route!(create_payment => Post "/payments" impl PaymentGatewayDatabase);
/// Route handler for payment creation
///
/// Creates a `PENDING` payment for an order. The body names the order, the amount (which must equal the order total
/// exactly), the currency, the payment method and the provider (`pgProvider`) that will process the payment.
///
/// An order can only have one pending or completed payment at a time. Attempts to create a second one fail with
/// `409 DUPLICATE_PAYMENT`.
pub async fn create_payment<B: PaymentGatewayDatabase>(
    body: web::Json<NewPayment>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payment = body.into_inner();
    debug!("💻️ POST new {} payment of {} for order {}", payment.provider, payment.amount, payment.order_id);
    let payment = api.create_payment(payment).await?;
    Ok(HttpResponse::Created().json(payment))
}

route!(payment_intent => Post "/payments/{id}/intent" impl PaymentGatewayDatabase);
/// Route handler for provider-side registration of a pending payment
///
/// For providers that work with payment intents (STRIPE), creates the intent for the payment's amount and stores its
/// id as the payment's `pgTransactionId`. The response carries the payment and the `clientSecret` the buyer's browser
/// uses to pay. Providers without intents answer `400 INVALID_REQUEST`.
pub async fn payment_intent<B: PaymentGatewayDatabase>(
    path: web::Path<i64>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = PaymentId(path.into_inner());
    debug!("💻️ POST intent for payment {payment_id}");
    let intent = api.create_provider_intent(payment_id).await?;
    Ok(HttpResponse::Ok().json(intent))
}

route!(process_payment => Post "/payments/{id}/process" impl PaymentGatewayDatabase);
/// Route handler for payment confirmation
///
/// Asks the payment's provider to capture the charge named by `pgTransactionId`. On success the payment is
/// `COMPLETED` and its order `CONFIRMED`. A payment can only be confirmed once.
pub async fn process_payment<B: PaymentGatewayDatabase>(
    path: web::Path<i64>,
    body: web::Json<ProcessPaymentRequest>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = PaymentId(path.into_inner());
    let provider_ref = body.into_inner().pg_transaction_id;
    debug!("💻️ POST process payment {payment_id} with {provider_ref}");
    let payment = api.confirm_payment(payment_id, &provider_ref).await?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(refund_payment => Post "/payments/{id}/refund" impl PaymentGatewayDatabase);
/// Route handler for refunds
///
/// Refunds a `COMPLETED` payment in full and cancels its order. The reason is taken from the `reason` query parameter.
pub async fn refund_payment<B: PaymentGatewayDatabase>(
    path: web::Path<i64>,
    query: web::Query<RefundParams>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = PaymentId(path.into_inner());
    let reason = query.reason();
    debug!("💻️ POST refund payment {payment_id} because \"{reason}\"");
    let payment = api.refund_payment(payment_id, reason).await?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(payment_by_id => Get "/payments/{id}" impl PaymentGatewayDatabase);
pub async fn payment_by_id<B: PaymentGatewayDatabase>(
    path: web::Path<i64>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = PaymentId(path.into_inner());
    debug!("💻️ GET payment {payment_id}");
    let payment = api
        .payment_by_id(payment_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Payment {payment_id} does not exist")))?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(provider_status => Get "/payments/{id}/status" impl PaymentGatewayDatabase);
/// Fetches the provider's current view of a payment's transaction. The stored payment is not changed.
pub async fn provider_status<B: PaymentGatewayDatabase>(
    path: web::Path<i64>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = PaymentId(path.into_inner());
    debug!("💻️ GET provider status for payment {payment_id}");
    let status = api.query_provider_status(payment_id).await?;
    Ok(HttpResponse::Ok().json(status))
}

route!(payments_for_order => Get "/payments/order/{order_id}" impl PaymentGatewayDatabase);
pub async fn payments_for_order<B: PaymentGatewayDatabase>(
    path: web::Path<i64>,
    query: web::Query<PageParams>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    debug!("💻️ GET payments for order {order_id}");
    let payments = api.payments_for_order(order_id, query.into_inner().into()).await?;
    Ok(HttpResponse::Ok().json(payments))
}

route!(payment_by_transaction => Get "/payments/transaction/{txn_id}" impl PaymentGatewayDatabase);
pub async fn payment_by_transaction<B: PaymentGatewayDatabase>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let txn_id = path.into_inner();
    debug!("💻️ GET payment for transaction {txn_id}");
    let payment = api
        .payment_by_external_txn_id(&txn_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No payment carries the transaction id {txn_id}")))?;
    Ok(HttpResponse::Ok().json(payment))
}
