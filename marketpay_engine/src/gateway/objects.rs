use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db_types::{CanonicalStatus, Money, OrderId, PaymentId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRequest {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: String,
}

/// A charge registered with the processor ahead of confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    /// The processor's id for the charge. Status notifications for the payment carry this id.
    pub external_txn_id: String,
    /// Handed to the buyer's browser to complete the charge. Never stored.
    pub client_secret: Option<String>,
    pub raw_response: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmRequest {
    /// The processor's handle for the pending charge (payment key, tid or payment intent id).
    pub provider_ref: String,
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmResult {
    pub external_txn_id: String,
    pub status: CanonicalStatus,
    pub raw_response: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    pub external_txn_id: String,
    /// `None` when the processor reports a status with no canonical equivalent, e.g. a charge still in progress.
    pub status: Option<CanonicalStatus>,
    pub native_status: String,
    pub raw_response: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub external_txn_id: String,
    pub amount: Money,
    pub currency: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelResult {
    pub status: CanonicalStatus,
    pub raw_response: Value,
}
