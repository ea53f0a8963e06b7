use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use marketpay_engine::{OrderFlowError, PaymentFlowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    PaymentFlow(#[from] PaymentFlowError),
    #[error("{0}")]
    OrderFlow(#[from] OrderFlowError),
}

impl ServerError {
    /// The stable error code reported to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PaymentFlow(e) => e.code(),
            Self::OrderFlow(e) => e.code(),
            Self::InvalidRequestBody(_) | Self::InvalidRequestPath(_) => "INVALID_REQUEST",
            Self::NoRecordFound(_) => "NOT_FOUND",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PaymentFlow(e) => match e {
                PaymentFlowError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                PaymentFlowError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
                PaymentFlowError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
                PaymentFlowError::AmountMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                PaymentFlowError::DuplicatePayment(_) => StatusCode::CONFLICT,
                PaymentFlowError::AlreadyProcessed { .. } => StatusCode::CONFLICT,
                PaymentFlowError::UnsupportedProvider(_) => StatusCode::BAD_REQUEST,
                PaymentFlowError::InvalidState { .. } => StatusCode::CONFLICT,
                PaymentFlowError::InvalidTransition(_) => StatusCode::CONFLICT,
                PaymentFlowError::ConfirmationFailed(_) => StatusCode::PAYMENT_REQUIRED,
                PaymentFlowError::ProviderError(_) => StatusCode::FAILED_DEPENDENCY,
                PaymentFlowError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                PaymentFlowError::Conflict(_) => StatusCode::CONFLICT,
                PaymentFlowError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::OrderFlow(e) => match e {
                OrderFlowError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                OrderFlowError::Forbidden(_) => StatusCode::FORBIDDEN,
                OrderFlowError::InvalidOrder(_) => StatusCode::BAD_REQUEST,
                OrderFlowError::InvalidTransition(_) => StatusCode::CONFLICT,
                OrderFlowError::Conflict(_) | OrderFlowError::ActivePayment(_) => StatusCode::CONFLICT,
                OrderFlowError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("💻️ Request failed. {self}");
        }
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "code": self.code(), "error": self.to_string() }).to_string())
    }
}
