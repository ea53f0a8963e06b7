//! # MarketPay server
//! This module hosts the HTTP server for the MarketPay gateway. It is responsible for:
//! * Accepting orders and moving them through their lifecycle on behalf of buyers and sellers.
//! * Creating, confirming and refunding payments through the configured payment providers.
//! * Receiving status notifications from the payment providers and reconciling them with stored payments.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/orders`: Order placement, search, status updates and buyer cancellation.
//! * `/payments`: Payment creation, confirmation (`/payments/{id}/process`), refunds and queries.
//! * `/payments/webhook/{provider}`: The webhook route for provider notifications. Always answers 200.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod routes;
pub mod server;
pub mod webhook_routes;
pub mod webhooks;

#[cfg(test)]
mod endpoint_tests;
