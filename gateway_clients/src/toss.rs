//! TOSS Payments.
//!
//! Requests authenticate with HTTP Basic credentials made from the secret key and an empty password. Payments are
//! confirmed by `paymentKey`, and amounts are decimal major units.
use async_trait::async_trait;
use log::*;
use marketpay_engine::{
    db_types::{CanonicalStatus, ProviderTag},
    gateway::{CancelRequest, CancelResult, ConfirmRequest, ConfirmResult, StatusResult},
    PaymentProvider,
    ProviderError,
};
use reqwest::Method;
use serde_json::{json, Value};

use crate::{
    api::{RequestBody, RestClient, RestResponse},
    config::TossConfig,
    helpers::{basic_auth, decimal_amount, str_field},
    GatewayClientError,
};

pub const TOSS: &str = "TOSS";

/// Maps a TOSS payment status onto a canonical status.
///
/// | status                          | Canonical |
/// |---------------------------------|-----------|
/// | `DONE`                          | Completed |
/// | `CANCELED`, `PARTIAL_CANCELED`  | Refunded  |
/// | `ABORTED`, `EXPIRED`            | Failed    |
pub fn canonical_status(status: &str) -> Option<CanonicalStatus> {
    match status.trim().to_ascii_uppercase().as_str() {
        "DONE" => Some(CanonicalStatus::Completed),
        "CANCELED" | "PARTIAL_CANCELED" => Some(CanonicalStatus::Refunded),
        "ABORTED" | "EXPIRED" => Some(CanonicalStatus::Failed),
        _ => None,
    }
}

/// Maps a TOSS webhook event type onto a canonical status.
pub fn canonical_event(event_type: &str) -> Option<CanonicalStatus> {
    match event_type.trim().to_ascii_uppercase().as_str() {
        "PAYMENT_CONFIRMED" => Some(CanonicalStatus::Completed),
        "PAYMENT_CANCELED" => Some(CanonicalStatus::Refunded),
        "PAYMENT_FAILED" => Some(CanonicalStatus::Failed),
        _ => None,
    }
}

#[derive(Clone)]
pub struct TossClient {
    api: RestClient,
}

impl TossClient {
    pub fn new(config: TossConfig) -> Result<Self, GatewayClientError> {
        let auth = basic_auth(config.secret_key.reveal(), "");
        let api = RestClient::new(&config.api_url, &auth)?;
        Ok(Self { api })
    }

    /// TOSS errors look like `{"code": "REJECT_CARD_COMPANY", "message": "..."}`.
    fn rejection(response: RestResponse) -> ProviderError {
        let code = str_field(&response.body, "code");
        let message = str_field(&response.body, "message");
        let message = if code.is_empty() { message.to_string() } else { format!("{code}: {message}") };
        ProviderError::Rejected { status: response.status, message, raw: Some(response.body) }
    }

    async fn send(&self, method: Method, path: &str, body: RequestBody) -> Result<Value, ProviderError> {
        let response = self.api.rest_query(method, path, body).await?;
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(Self::rejection(response))
        }
    }
}

#[async_trait]
impl PaymentProvider for TossClient {
    fn tag(&self) -> ProviderTag {
        ProviderTag::new(TOSS)
    }

    async fn confirm(&self, request: ConfirmRequest) -> Result<ConfirmResult, ProviderError> {
        debug!("🔌️ Confirming TOSS payment {} ({} {})", request.provider_ref, request.amount, request.currency);
        let body = json!({
            "paymentKey": request.provider_ref,
            "orderId": request.order_id.value().to_string(),
            "amount": decimal_amount(request.amount)?,
        });
        let body = self.send(Method::POST, "/v1/payments/confirm", RequestBody::Json(body)).await?;
        let native_status = str_field(&body, "status").to_string();
        if canonical_status(&native_status) != Some(CanonicalStatus::Completed) {
            return Err(ProviderError::Declined {
                code: native_status,
                message: format!("TOSS did not complete payment {}", request.provider_ref),
                raw: Some(body),
            });
        }
        let external_txn_id = body["paymentKey"].as_str().map(String::from).unwrap_or(request.provider_ref);
        info!("🔌️ TOSS confirmed {external_txn_id}");
        Ok(ConfirmResult { external_txn_id, status: CanonicalStatus::Completed, raw_response: body })
    }

    async fn query(&self, external_txn_id: &str) -> Result<StatusResult, ProviderError> {
        let path = format!("/v1/payments/{external_txn_id}");
        let body = self.send(Method::GET, &path, RequestBody::Empty).await?;
        let native_status = str_field(&body, "status").to_string();
        Ok(StatusResult {
            external_txn_id: external_txn_id.to_string(),
            status: canonical_status(&native_status),
            native_status,
            raw_response: body,
        })
    }

    async fn cancel(&self, request: CancelRequest) -> Result<CancelResult, ProviderError> {
        let payment_key = request.external_txn_id;
        debug!("🔌️ Cancelling TOSS payment {payment_key} ({} {})", request.amount, request.currency);
        let body = json!({
            "cancelReason": request.reason,
            "cancelAmount": decimal_amount(request.amount)?,
        });
        let path = format!("/v1/payments/{payment_key}/cancel");
        let body = self.send(Method::POST, &path, RequestBody::Json(body)).await?;
        let native_status = str_field(&body, "status").to_string();
        match canonical_status(&native_status) {
            Some(CanonicalStatus::Refunded) => {
                info!("🔌️ TOSS cancelled {payment_key}");
                Ok(CancelResult { status: CanonicalStatus::Refunded, raw_response: body })
            },
            _ => Err(ProviderError::UnexpectedResponse(format!(
                "TOSS reported {native_status} after cancelling {payment_key}"
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use marketpay_engine::db_types::{Money, OrderId, PaymentId};
    use wiremock::{
        matchers::{body_partial_json, header, method, path},
        Mock,
        MockServer,
        ResponseTemplate,
    };

    use super::*;

    fn client(server: &MockServer) -> TossClient {
        TossClient::new(TossConfig::new("test_sk_123").with_api_url(server.uri())).unwrap()
    }

    fn confirm_request() -> ConfirmRequest {
        ConfirmRequest {
            provider_ref: "pk_abc".into(),
            payment_id: PaymentId(7),
            order_id: OrderId(42),
            amount: Money::from_str("15000").unwrap(),
            currency: "KRW".into(),
        }
    }

    #[test]
    fn status_tables() {
        assert_eq!(canonical_status("DONE"), Some(CanonicalStatus::Completed));
        assert_eq!(canonical_status("PARTIAL_CANCELED"), Some(CanonicalStatus::Refunded));
        assert_eq!(canonical_status("EXPIRED"), Some(CanonicalStatus::Failed));
        assert_eq!(canonical_status("WAITING_FOR_DEPOSIT"), None);
        assert_eq!(canonical_event("PAYMENT_CONFIRMED"), Some(CanonicalStatus::Completed));
        assert_eq!(canonical_event("PAYMENT_CANCELED"), Some(CanonicalStatus::Refunded));
        assert_eq!(canonical_event("PAYMENT_FAILED"), Some(CanonicalStatus::Failed));
        assert_eq!(canonical_event("DEPOSIT_CALLBACK"), None);
    }

    #[tokio::test]
    async fn confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payments/confirm"))
            .and(header("Authorization", "Basic dGVzdF9za18xMjM6"))
            .and(body_partial_json(json!({"paymentKey": "pk_abc", "orderId": "42", "amount": 15000})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "paymentKey": "pk_abc",
                "orderId": "42",
                "status": "DONE",
                "totalAmount": 15000,
                "method": "CARD"
            })))
            .expect(1)
            .mount(&server)
            .await;
        let result = client(&server).confirm(confirm_request()).await.unwrap();
        assert_eq!(result.external_txn_id, "pk_abc");
        assert_eq!(result.status, CanonicalStatus::Completed);
        assert_eq!(result.raw_response["method"], "CARD");
    }

    #[tokio::test]
    async fn rejected_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payments/confirm"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "code": "REJECT_CARD_COMPANY",
                "message": "Card declined"
            })))
            .mount(&server)
            .await;
        let err = client(&server).confirm(confirm_request()).await.unwrap_err();
        match err {
            ProviderError::Rejected { status, message, raw } => {
                assert_eq!(status, 403);
                assert_eq!(message, "REJECT_CARD_COMPANY: Card declined");
                assert!(raw.is_some());
            },
            e => panic!("Expected a rejection, got {e}"),
        }
    }

    #[tokio::test]
    async fn incomplete_confirmation_is_declined() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payments/confirm"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "paymentKey": "pk_abc",
                "status": "WAITING_FOR_DEPOSIT"
            })))
            .mount(&server)
            .await;
        let err = client(&server).confirm(confirm_request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Declined { ref code, .. } if code == "WAITING_FOR_DEPOSIT"), "{err}");
    }

    #[tokio::test]
    async fn query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/payments/pk_abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"paymentKey": "pk_abc", "status": "DONE"})))
            .mount(&server)
            .await;
        let status = client(&server).query("pk_abc").await.unwrap();
        assert_eq!(status.status, Some(CanonicalStatus::Completed));
        assert_eq!(status.native_status, "DONE");
    }

    #[tokio::test]
    async fn cancellation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payments/pk_abc/cancel"))
            .and(body_partial_json(json!({"cancelReason": "customer request", "cancelAmount": 15000})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "paymentKey": "pk_abc",
                "status": "CANCELED",
                "cancels": [{"cancelAmount": 15000, "cancelReason": "customer request"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        let request = CancelRequest {
            external_txn_id: "pk_abc".into(),
            amount: Money::from_str("15000").unwrap(),
            currency: "KRW".into(),
            reason: "customer request".into(),
        };
        let result = client(&server).cancel(request).await.unwrap();
        assert_eq!(result.status, CanonicalStatus::Refunded);
    }
}
