use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
        PoisonError,
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::json;

use crate::{
    db_types::{CanonicalStatus, ProviderTag},
    gateway::{
        CancelRequest,
        CancelResult,
        ConfirmRequest,
        ConfirmResult,
        IntentRequest,
        IntentResult,
        PaymentProvider,
        ProviderError,
        StatusResult,
    },
};

/// An in-memory payment provider with scripted behaviour.
///
/// By default every confirmation and cancellation succeeds, and the provider reference passed to `confirm` becomes
/// the transaction id. Intents are registered as `intent_<payment id>`.
pub struct FakeProvider {
    tag: ProviderTag,
    txn_id: Option<String>,
    confirm_error: Mutex<Option<ProviderError>>,
    cancel_error: Mutex<Option<ProviderError>>,
    delay: Option<Duration>,
    confirm_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
    intent_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new<S: AsRef<str>>(tag: S) -> Self {
        Self {
            tag: ProviderTag::new(tag),
            txn_id: None,
            confirm_error: Mutex::new(None),
            cancel_error: Mutex::new(None),
            delay: None,
            confirm_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            intent_calls: AtomicUsize::new(0),
        }
    }

    /// Report this transaction id for every successful confirmation.
    pub fn with_txn_id<S: Into<String>>(mut self, txn_id: S) -> Self {
        self.txn_id = Some(txn_id.into());
        self
    }

    /// Wait this long before answering any call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_confirmations(&self, error: ProviderError) {
        *self.confirm_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn fail_cancellations(&self, error: ProviderError) {
        *self.cancel_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn intent_calls(&self) -> usize {
        self.intent_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

/// A scripted error stays usable after a test thread panics while holding the lock.
fn scripted(error: &Mutex<Option<ProviderError>>) -> Option<ProviderError> {
    error.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    fn tag(&self) -> ProviderTag {
        self.tag.clone()
    }

    async fn create_intent(&self, request: IntentRequest) -> Result<Option<IntentResult>, ProviderError> {
        self.intent_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let external_txn_id = format!("intent_{}", request.payment_id.value());
        let raw_response = json!({
            "id": external_txn_id,
            "amount": request.amount.to_string(),
            "status": "requires_payment_method",
        });
        let client_secret = Some(format!("{external_txn_id}_secret"));
        Ok(Some(IntentResult { external_txn_id, client_secret, raw_response }))
    }

    async fn confirm(&self, request: ConfirmRequest) -> Result<ConfirmResult, ProviderError> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let error = scripted(&self.confirm_error);
        if let Some(e) = error {
            return Err(e);
        }
        let external_txn_id = self.txn_id.clone().unwrap_or(request.provider_ref);
        let raw_response = json!({
            "transactionId": external_txn_id,
            "amount": request.amount.to_string(),
            "status": "DONE",
        });
        Ok(ConfirmResult { external_txn_id, status: CanonicalStatus::Completed, raw_response })
    }

    async fn query(&self, external_txn_id: &str) -> Result<StatusResult, ProviderError> {
        self.pause().await;
        Ok(StatusResult {
            external_txn_id: external_txn_id.to_string(),
            status: Some(CanonicalStatus::Completed),
            native_status: "DONE".to_string(),
            raw_response: json!({ "transactionId": external_txn_id, "status": "DONE" }),
        })
    }

    async fn cancel(&self, request: CancelRequest) -> Result<CancelResult, ProviderError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let error = scripted(&self.cancel_error);
        if let Some(e) = error {
            return Err(e);
        }
        let raw_response = json!({
            "transactionId": request.external_txn_id,
            "cancelAmount": request.amount.to_string(),
            "status": "CANCELED",
        });
        Ok(CancelResult { status: CanonicalStatus::Refunded, raw_response })
    }
}
