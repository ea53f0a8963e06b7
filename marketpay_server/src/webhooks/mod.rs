//! Provider notifications
//!
//! Each provider pushes status changes in its own shape. This module pulls the provider's transaction id and native
//! status out of a notification and maps the status onto a [`CanonicalStatus`] using the provider's status table.
//! Notifications whose status has no canonical meaning are returned with `status: None` and are not applied.
pub mod signatures;

use gateway_clients::{helpers::str_field, nicepay, stripe, toss};
use marketpay_engine::db_types::{CanonicalStatus, ProviderTag};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Notifications from {0} are not supported")]
    UnknownProvider(String),
    #[error("The notification body is not valid JSON. {0}")]
    MalformedBody(String),
    #[error("The notification is missing the {0} field")]
    MissingField(&'static str),
    #[error("The notification signature could not be verified. {0}")]
    InvalidSignature(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub external_txn_id: String,
    /// The provider's own name for the event or status, for logging.
    pub native_status: String,
    pub status: Option<CanonicalStatus>,
}

pub fn parse_notification(provider: &ProviderTag, body: &[u8]) -> Result<Notification, WebhookError> {
    let json = serde_json::from_slice::<Value>(body).map_err(|e| WebhookError::MalformedBody(e.to_string()))?;
    match provider.as_str() {
        toss::TOSS => parse_toss(&json),
        nicepay::NICEPAY => parse_nicepay(&json),
        stripe::STRIPE => parse_stripe(&json),
        other => Err(WebhookError::UnknownProvider(other.to_string())),
    }
}

/// `{"eventType": "PAYMENT_CONFIRMED", "data": {"paymentKey": "...", "status": "DONE"}}`
///
/// The event type takes precedence. Status-change events that carry no recognised event type fall back to the
/// payment status.
fn parse_toss(json: &Value) -> Result<Notification, WebhookError> {
    let data = &json["data"];
    let external_txn_id = required(data, "paymentKey", "data.paymentKey")?;
    let event_type = str_field(json, "eventType");
    let payment_status = str_field(data, "status");
    let (native_status, status) = match toss::canonical_event(event_type) {
        Some(status) => (event_type, Some(status)),
        None => (payment_status, toss::canonical_status(payment_status)),
    };
    Ok(Notification { external_txn_id, native_status: native_status.to_string(), status })
}

/// `{"resultCode": "0000", "tid": "...", "status": "paid"}`
fn parse_nicepay(json: &Value) -> Result<Notification, WebhookError> {
    let external_txn_id = required(json, "tid", "tid")?;
    let result_code = required(json, "resultCode", "resultCode")?;
    let native_status = str_field(json, "status");
    let status = nicepay::canonical_status(&result_code, native_status);
    let native_status = if native_status.is_empty() { result_code } else { native_status.to_string() };
    Ok(Notification { external_txn_id, native_status, status })
}

/// `{"type": "payment_intent.succeeded", "data": {"object": {"id": "pi_...", "status": "succeeded"}}}`
///
/// Charge events identify the payment by the charge's `payment_intent`, since payment intents are what the payment
/// is confirmed against.
fn parse_stripe(json: &Value) -> Result<Notification, WebhookError> {
    let object = &json["data"]["object"];
    let external_txn_id = if str_field(object, "object") == "charge" {
        required(object, "payment_intent", "data.object.payment_intent")?
    } else {
        required(object, "id", "data.object.id")?
    };
    let event_type = str_field(json, "type");
    let object_status = str_field(object, "status");
    let (native_status, status) = match stripe::canonical_event(event_type) {
        Some(status) => (event_type, Some(status)),
        None => (object_status, stripe::canonical_status(object_status)),
    };
    Ok(Notification { external_txn_id, native_status: native_status.to_string(), status })
}

fn required(value: &Value, field: &str, name: &'static str) -> Result<String, WebhookError> {
    match str_field(value, field).trim() {
        "" => Err(WebhookError::MissingField(name)),
        s => Ok(s.to_string()),
    }
}
