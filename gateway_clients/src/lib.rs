//! Payment provider adapters
//!
//! REST clients for the payment processors the marketplace supports. Each client implements
//! [`marketpay_engine::PaymentProvider`], translating between the engine's canonical requests and the processor's own
//! API. The `canonical_status` and `canonical_event` tables in each module are also used to interpret webhook
//! notifications.
mod api;
pub mod config;
mod error;
pub mod helpers;
pub mod nicepay;
pub mod stripe;
pub mod toss;

pub use config::{NicePayConfig, StripeConfig, TossConfig};
pub use error::GatewayClientError;
pub use nicepay::NicePayClient;
pub use stripe::StripeClient;
pub use toss::TossClient;
