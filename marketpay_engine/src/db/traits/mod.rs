mod data_objects;
mod errors;
mod order_management;
mod payment_gateway_database;
mod payment_management;

pub use data_objects::{InsertPaymentResult, PaymentTransition, WebhookOutcome};
pub use errors::PaymentGatewayError;
pub use order_management::OrderManagement;
pub use payment_gateway_database::PaymentGatewayDatabase;
pub use payment_management::PaymentManagement;
