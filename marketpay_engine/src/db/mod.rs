//! #  Database management and control.
//!
//! This module provides the interfaces that define the contracts of the payment engine database *backends*.
//!
//! ## Orders and payments
//! An order records what a buyer owes a seller. A payment records one attempt to settle that debt through one of the
//! configured payment providers. At most one payment per order may be *active* (pending or completed) at a time, and
//! backends must enforce this themselves, since two requests for the same order may race each other.
//!
//! ## Traits
//! The [`traits`] module defines behaviour that database backends need to expose in order to be supported by the
//! payment engine.
//!
//! * [`PaymentGatewayDatabase`] defines the atomic, multi-record state changes that drive the payment flow.
//! * [`OrderManagement`] defines the behaviour for querying and updating orders.
//! * [`PaymentManagement`] defines the behaviour for querying payments.
//!
//! [`PaymentGatewayDatabase`]: traits::PaymentGatewayDatabase
//! [`OrderManagement`]: traits::OrderManagement
//! [`PaymentManagement`]: traits::PaymentManagement
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;
