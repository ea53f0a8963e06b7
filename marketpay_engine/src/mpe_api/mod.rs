pub mod errors;
pub mod order_flow_api;
pub mod payment_flow_api;
