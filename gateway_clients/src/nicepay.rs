//! NICEPAY card and bank transfer processing.
//!
//! Requests authenticate with HTTP Basic credentials made from the merchant id and merchant key. Approval and
//! cancellation requests also carry a SHA-256 signature over the transaction id, the amount and the merchant key.
//! Amounts are decimal major units. A `resultCode` of `0000` means success.
use async_trait::async_trait;
use log::*;
use marketpay_engine::{
    db_types::{CanonicalStatus, Money, ProviderTag},
    gateway::{CancelRequest, CancelResult, ConfirmRequest, ConfirmResult, StatusResult},
    PaymentProvider,
    ProviderError,
};
use reqwest::Method;
use serde_json::{json, Value};

use crate::{
    api::{RequestBody, RestClient, RestResponse},
    config::NicePayConfig,
    helpers::{basic_auth, decimal_amount, parse_amount, sha256_hex, str_field},
    GatewayClientError,
};

pub const NICEPAY: &str = "NICEPAY";
pub const SUCCESS_CODE: &str = "0000";

/// Maps a NICEPAY result code and status onto a canonical status.
///
/// | resultCode | status      | Canonical |
/// |------------|-------------|-----------|
/// | `0000`     | `paid`      | Completed |
/// | `0000`     | `cancelled` | Refunded  |
/// | other      | any         | Failed    |
pub fn canonical_status(result_code: &str, status: &str) -> Option<CanonicalStatus> {
    if result_code != SUCCESS_CODE {
        return Some(CanonicalStatus::Failed);
    }
    match status.trim().to_ascii_lowercase().as_str() {
        "paid" => Some(CanonicalStatus::Completed),
        "cancelled" => Some(CanonicalStatus::Refunded),
        _ => None,
    }
}

#[derive(Clone)]
pub struct NicePayClient {
    config: NicePayConfig,
    api: RestClient,
}

impl NicePayClient {
    pub fn new(config: NicePayConfig) -> Result<Self, GatewayClientError> {
        let auth = basic_auth(&config.merchant_id, config.merchant_key.reveal());
        let api = RestClient::new(&config.api_url, &auth)?;
        Ok(Self { config, api })
    }

    /// `hex(sha256(tid + amount + merchant_key))`
    pub fn signature(&self, tid: &str, amount: Money) -> String {
        sha256_hex(&format!("{tid}{amount}{}", self.config.merchant_key.reveal()))
    }

    fn check_result(&self, response: RestResponse) -> Result<Value, ProviderError> {
        let code = str_field(&response.body, "resultCode").to_string();
        let message = str_field(&response.body, "resultMsg").to_string();
        if !response.is_success() {
            return Err(ProviderError::Rejected { status: response.status, message, raw: Some(response.body) });
        }
        if code != SUCCESS_CODE {
            return Err(ProviderError::Declined { code, message, raw: Some(response.body) });
        }
        Ok(response.body)
    }
}

#[async_trait]
impl PaymentProvider for NicePayClient {
    fn tag(&self) -> ProviderTag {
        ProviderTag::new(NICEPAY)
    }

    async fn confirm(&self, request: ConfirmRequest) -> Result<ConfirmResult, ProviderError> {
        let tid = request.provider_ref;
        debug!("🔌️ Requesting NICEPAY approval for {tid} ({} {})", request.amount, request.currency);
        let body = json!({
            "tid": tid,
            "amt": decimal_amount(request.amount)?,
            "orderId": request.order_id.value().to_string(),
            "signature": self.signature(&tid, request.amount),
        });
        let path = format!("/v1/payments/{tid}");
        let response = self.api.rest_query(Method::POST, &path, RequestBody::Json(body)).await?;
        let body = self.check_result(response)?;
        if let Some(approved) = parse_amount(&body["amt"]) {
            if approved != request.amount {
                return Err(ProviderError::UnexpectedResponse(format!(
                    "NICEPAY approved {approved} for {tid}, but {} was requested",
                    request.amount
                )));
            }
        }
        let external_txn_id = body["tid"].as_str().map(String::from).unwrap_or(tid);
        info!("🔌️ NICEPAY approved {external_txn_id}");
        Ok(ConfirmResult { external_txn_id, status: CanonicalStatus::Completed, raw_response: body })
    }

    async fn query(&self, external_txn_id: &str) -> Result<StatusResult, ProviderError> {
        let path = format!("/v1/payments/{external_txn_id}");
        let response = self.api.rest_query(Method::GET, &path, RequestBody::Empty).await?;
        if !response.is_success() {
            let message = str_field(&response.body, "resultMsg").to_string();
            return Err(ProviderError::Rejected { status: response.status, message, raw: Some(response.body) });
        }
        let code = str_field(&response.body, "resultCode");
        let native_status = str_field(&response.body, "status");
        let status = canonical_status(code, native_status);
        let native_status = if native_status.is_empty() { code.to_string() } else { native_status.to_string() };
        Ok(StatusResult {
            external_txn_id: external_txn_id.to_string(),
            status,
            native_status,
            raw_response: response.body,
        })
    }

    async fn cancel(&self, request: CancelRequest) -> Result<CancelResult, ProviderError> {
        let tid = request.external_txn_id;
        debug!("🔌️ Requesting NICEPAY cancellation of {tid} ({} {})", request.amount, request.currency);
        let body = json!({
            "cancelAmt": decimal_amount(request.amount)?,
            "cancelMsg": request.reason,
            "partialCancelCode": false,
            "signature": self.signature(&tid, request.amount),
        });
        let path = format!("/v1/payments/{tid}/cancel");
        let response = self.api.rest_query(Method::POST, &path, RequestBody::Json(body)).await?;
        let body = self.check_result(response)?;
        info!("🔌️ NICEPAY cancelled {tid}");
        Ok(CancelResult { status: CanonicalStatus::Refunded, raw_response: body })
    }
}
