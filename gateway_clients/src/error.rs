use marketpay_engine::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayClientError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
}

impl From<GatewayClientError> for ProviderError {
    fn from(e: GatewayClientError) -> Self {
        ProviderError::Configuration(e.to_string())
    }
}

/// Classifies a transport-level failure.
pub(crate) fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Network(format!("Request timed out. {e}"))
    } else if e.is_decode() {
        ProviderError::UnexpectedResponse(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}
