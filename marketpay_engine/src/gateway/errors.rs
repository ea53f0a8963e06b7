use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("The payment provider did not respond within {0:?}")]
    Timeout(Duration),
    #[error("Could not reach the payment provider: {0}")]
    Network(String),
    #[error("The payment provider rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String, raw: Option<Value> },
    #[error("The payment provider declined the transaction ({code}): {message}")]
    Declined { code: String, message: String, raw: Option<Value> },
    #[error("The amount cannot be sent to the payment provider: {0}")]
    InvalidAmount(String),
    #[error("Unexpected response from the payment provider: {0}")]
    UnexpectedResponse(String),
    #[error("The payment provider is misconfigured: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// The provider's own response body, when one was received.
    pub fn raw(&self) -> Option<&Value> {
        match self {
            ProviderError::Rejected { raw, .. } | ProviderError::Declined { raw, .. } => raw.as_ref(),
            _ => None,
        }
    }

    /// An audit record of the failure, suitable for storing against the payment.
    pub fn to_audit_record(&self) -> Value {
        match self.raw() {
            Some(raw) => json!({ "error": self.to_string(), "response": raw }),
            None => json!({ "error": self.to_string() }),
        }
    }
}
