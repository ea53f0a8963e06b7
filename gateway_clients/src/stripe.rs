//! Stripe payment intents and refunds.
//!
//! Requests authenticate with the secret API key as a bearer token and are form-encoded. Amounts are integer minor
//! units (cents), so amounts with sub-cent precision cannot be sent.
use async_trait::async_trait;
use log::*;
use marketpay_engine::{
    db_types::{CanonicalStatus, Money, ProviderTag},
    gateway::{
        CancelRequest,
        CancelResult,
        ConfirmRequest,
        ConfirmResult,
        IntentRequest,
        IntentResult,
        StatusResult,
    },
    PaymentProvider,
    ProviderError,
};
use reqwest::Method;
use serde_json::Value;

use crate::{
    api::{RequestBody, RestClient, RestResponse},
    config::StripeConfig,
    helpers::str_field,
    GatewayClientError,
};

pub const STRIPE: &str = "STRIPE";

/// Maps a Stripe object status onto a canonical status.
///
/// | status                | Canonical |
/// |-----------------------|-----------|
/// | `succeeded`           | Completed |
/// | `refunded`            | Refunded  |
/// | `failed`, `canceled`  | Failed    |
pub fn canonical_status(status: &str) -> Option<CanonicalStatus> {
    match status.trim().to_ascii_lowercase().as_str() {
        "succeeded" => Some(CanonicalStatus::Completed),
        "refunded" => Some(CanonicalStatus::Refunded),
        "failed" | "canceled" => Some(CanonicalStatus::Failed),
        _ => None,
    }
}

/// Maps a Stripe event type onto a canonical status.
pub fn canonical_event(event_type: &str) -> Option<CanonicalStatus> {
    match event_type.trim() {
        "payment_intent.succeeded" => Some(CanonicalStatus::Completed),
        "charge.refunded" => Some(CanonicalStatus::Refunded),
        "payment_intent.payment_failed" | "payment_intent.canceled" => Some(CanonicalStatus::Failed),
        _ => None,
    }
}

fn minor_units(amount: Money) -> Result<i64, ProviderError> {
    amount.to_minor_units().map_err(|e| ProviderError::InvalidAmount(e.to_string()))
}

#[derive(Clone)]
pub struct StripeClient {
    api: RestClient,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Result<Self, GatewayClientError> {
        let auth = format!("Bearer {}", config.secret_key.reveal());
        let api = RestClient::new(&config.api_url, &auth)?;
        Ok(Self { api })
    }

    /// Stripe errors look like `{"error": {"type": "card_error", "code": "card_declined", "message": "..."}}`.
    /// Card errors are declines; everything else is a rejection of the request.
    fn rejection(response: RestResponse) -> ProviderError {
        let error = &response.body["error"];
        let kind = str_field(error, "type");
        let code = str_field(error, "code").to_string();
        let message = str_field(error, "message").to_string();
        if kind == "card_error" {
            ProviderError::Declined { code, message, raw: Some(response.body) }
        } else {
            let message = if code.is_empty() { message } else { format!("{code}: {message}") };
            ProviderError::Rejected { status: response.status, message, raw: Some(response.body) }
        }
    }

    async fn send(&self, method: Method, path: &str, body: RequestBody) -> Result<Value, ProviderError> {
        let response = self.api.rest_query(method, path, body).await?;
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(Self::rejection(response))
        }
    }

    pub async fn retrieve_payment_intent(&self, id: &str) -> Result<Value, ProviderError> {
        self.send(Method::GET, &format!("/v1/payment_intents/{id}"), RequestBody::Empty).await
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    fn tag(&self) -> ProviderTag {
        ProviderTag::new(STRIPE)
    }

    async fn create_intent(&self, request: IntentRequest) -> Result<Option<IntentResult>, ProviderError> {
        let amount = minor_units(request.amount)?;
        debug!("🔌️ Creating Stripe payment intent for {amount} minor units of {}", request.currency);
        let params = vec![
            ("amount".to_string(), amount.to_string()),
            ("currency".to_string(), request.currency.to_ascii_lowercase()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
            ("metadata[payment_id]".to_string(), request.payment_id.value().to_string()),
            ("metadata[order_id]".to_string(), request.order_id.value().to_string()),
        ];
        let mut intent = self.send(Method::POST, "/v1/payment_intents", RequestBody::Form(params)).await?;
        let external_txn_id = match intent["id"].as_str() {
            Some(id) => id.to_string(),
            None => return Err(ProviderError::UnexpectedResponse("Payment intent has no id".to_string())),
        };
        // The client secret goes to the buyer only
        let client_secret = intent.as_object_mut().and_then(|o| o.remove("client_secret")).and_then(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        });
        info!("🔌️ Stripe payment intent {external_txn_id} created for payment {}", request.payment_id);
        Ok(Some(IntentResult { external_txn_id, client_secret, raw_response: intent }))
    }

    async fn confirm(&self, request: ConfirmRequest) -> Result<ConfirmResult, ProviderError> {
        let id = request.provider_ref;
        let expected = minor_units(request.amount)?;
        debug!("🔌️ Confirming Stripe payment intent {id} ({expected} minor units of {})", request.currency);
        let mut intent = self.retrieve_payment_intent(&id).await?;
        let amount = intent["amount"].as_i64();
        let currency = str_field(&intent, "currency");
        if amount != Some(expected) || !currency.eq_ignore_ascii_case(&request.currency) {
            return Err(ProviderError::InvalidAmount(format!(
                "Payment intent {id} is for {} {currency}, but {expected} {} was expected",
                amount.unwrap_or_default(),
                request.currency
            )));
        }
        if str_field(&intent, "status") != "succeeded" {
            let params = vec![("metadata[payment_id]".to_string(), request.payment_id.value().to_string())];
            let path = format!("/v1/payment_intents/{id}/confirm");
            intent = self.send(Method::POST, &path, RequestBody::Form(params)).await?;
        }
        let native_status = str_field(&intent, "status").to_string();
        if canonical_status(&native_status) != Some(CanonicalStatus::Completed) {
            return Err(ProviderError::Declined {
                code: native_status,
                message: format!("Payment intent {id} did not succeed"),
                raw: Some(intent),
            });
        }
        let external_txn_id = intent["id"].as_str().map(String::from).unwrap_or(id);
        info!("🔌️ Stripe payment intent {external_txn_id} succeeded");
        Ok(ConfirmResult { external_txn_id, status: CanonicalStatus::Completed, raw_response: intent })
    }

    async fn query(&self, external_txn_id: &str) -> Result<StatusResult, ProviderError> {
        let intent = self.retrieve_payment_intent(external_txn_id).await?;
        let native_status = str_field(&intent, "status").to_string();
        Ok(StatusResult {
            external_txn_id: external_txn_id.to_string(),
            status: canonical_status(&native_status),
            native_status,
            raw_response: intent,
        })
    }

    async fn cancel(&self, request: CancelRequest) -> Result<CancelResult, ProviderError> {
        let id = request.external_txn_id;
        let amount = minor_units(request.amount)?;
        debug!("🔌️ Refunding Stripe payment intent {id} ({amount} minor units of {})", request.currency);
        let params = vec![
            ("payment_intent".to_string(), id.clone()),
            ("amount".to_string(), amount.to_string()),
            ("reason".to_string(), "requested_by_customer".to_string()),
            ("metadata[cancel_reason]".to_string(), request.reason),
        ];
        let refund = self.send(Method::POST, "/v1/refunds", RequestBody::Form(params)).await?;
        // A pending refund has been accepted and settles asynchronously
        match str_field(&refund, "status") {
            "succeeded" | "pending" => {
                info!("🔌️ Stripe refunded payment intent {id}");
                Ok(CancelResult { status: CanonicalStatus::Refunded, raw_response: refund })
            },
            status => Err(ProviderError::Declined {
                code: status.to_string(),
                message: format!("Stripe did not refund payment intent {id}"),
                raw: Some(refund.clone()),
            }),
        }
    }
}
