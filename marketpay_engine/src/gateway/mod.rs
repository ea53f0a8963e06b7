//! # Payment provider contract
//!
//! The engine does not talk to payment processors itself. Each processor is wrapped in an adapter that implements
//! [`PaymentProvider`], and the adapters are collected in a [`ProviderRegistry`] keyed by [`ProviderTag`].
//!
//! Adapters accept amounts in major units and are responsible for converting them to whatever unit their processor
//! expects. They also translate the processor's status vocabulary into a [`CanonicalStatus`].
//!
//! [`ProviderTag`]: crate::db_types::ProviderTag
//! [`CanonicalStatus`]: crate::db_types::CanonicalStatus
mod errors;
mod objects;
mod provider;
mod registry;

pub use errors::ProviderError;
pub use objects::{
    CancelRequest,
    CancelResult,
    ConfirmRequest,
    ConfirmResult,
    IntentRequest,
    IntentResult,
    StatusResult,
};
pub use provider::PaymentProvider;
pub use registry::ProviderRegistry;
