//! MarketPay Payment Engine
//!
//! The payment engine takes care of the money side of a marketplace order: it creates payments against orders,
//! confirms them with one of several external payment providers, refunds them, and reconciles the status updates that
//! providers push back asynchronously. Payment outcomes drive the order status state machine. It is
//! provider-agnostic: processors plug in through the [`PaymentProvider`] trait.
//!
//! The library is divided into these main sections:
//! 1. Database management and control ([`mod@db`]). SQLite is the supported backend. You should never need to access
//!    the database directly. Instead, use the public API provided by the payment engine. The exception is the data
//!    types used in the database. These are defined in the `db_types` module and are public.
//! 2. The payment engine public API ([`PaymentFlowApi`] and [`OrderFlowApi`]). Backends need to implement the traits
//!    in [`mod@db`] in order to act as a backend for the payment server.
//! 3. The payment provider contract ([`mod@gateway`]), which adapters for each payment processor implement.
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted when certain actions
//! occur within the payment engine. For example, when a payment completes, a `PaymentCompletedEvent` is emitted.
//! A simple Actor framework is used so that you can easily hook into these events and perform custom actions.
mod db;

pub mod db_types;
pub mod events;
pub mod gateway;
mod mpe_api;
pub mod state_machine;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{
    InsertPaymentResult,
    OrderManagement,
    PaymentGatewayDatabase,
    PaymentGatewayError,
    PaymentManagement,
    PaymentTransition,
    WebhookOutcome,
};
pub use gateway::{PaymentProvider, ProviderError, ProviderRegistry};
pub use mpe_api::{
    errors::{OrderFlowError, PaymentFlowError},
    order_flow_api::OrderFlowApi,
    payment_flow_api::{PaymentFlowApi, PaymentIntent, DEFAULT_PROVIDER_TIMEOUT},
};
