use async_trait::async_trait;
use marketpay_engine::{
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
use mockall::mock;
use serde_json::json;

mock! {
    pub Provider {}
    #[async_trait]
    impl PaymentProvider for Provider {
        fn tag(&self) -> ProviderTag;
        async fn create_intent(&self, request: IntentRequest) -> Result<Option<IntentResult>, ProviderError>;
        async fn confirm(&self, request: ConfirmRequest) -> Result<ConfirmResult, ProviderError>;
        async fn query(&self, external_txn_id: &str) -> Result<StatusResult, ProviderError>;
        async fn cancel(&self, request: CancelRequest) -> Result<CancelResult, ProviderError>;
    }
}

/// A provider registered as `tag` with no other expectations set.
pub fn provider(tag: &str) -> MockProvider {
    let mut mock = MockProvider::new();
    mock.expect_tag().return_const(ProviderTag::new(tag));
    mock
}

/// A provider that accepts every confirmation and refund, using the buyer's reference as the transaction id.
pub fn happy_provider(tag: &str) -> MockProvider {
    let mut mock = provider(tag);
    mock.expect_confirm().returning(|req| {
        Ok(ConfirmResult {
            raw_response: json!({"paymentKey": req.provider_ref, "status": "DONE"}),
            external_txn_id: req.provider_ref,
            status: CanonicalStatus::Completed,
        })
    });
    mock.expect_cancel().returning(|req| {
        Ok(CancelResult {
            status: CanonicalStatus::Refunded,
            raw_response: json!({"paymentKey": req.external_txn_id, "status": "CANCELED"}),
        })
    });
    mock.expect_create_intent().returning(|_| Ok(None));
    mock.expect_query().returning(|txn_id| {
        Ok(StatusResult {
            external_txn_id: txn_id.to_string(),
            status: Some(CanonicalStatus::Completed),
            native_status: "DONE".to_string(),
            raw_response: json!({"paymentKey": txn_id, "status": "DONE"}),
        })
    });
    mock
}

/// A provider that registers payment intents as `pi_<payment id>`, and accepts confirmations and refunds.
pub fn intent_provider(tag: &str) -> MockProvider {
    let mut mock = provider(tag);
    mock.expect_create_intent().returning(|req| {
        let external_txn_id = format!("pi_{}", req.payment_id.value());
        Ok(Some(IntentResult {
            raw_response: json!({"id": external_txn_id, "status": "requires_payment_method"}),
            client_secret: Some(format!("{external_txn_id}_secret")),
            external_txn_id,
        }))
    });
    mock.expect_confirm().returning(|req| {
        Ok(ConfirmResult {
            raw_response: json!({"id": req.provider_ref, "status": "succeeded"}),
            external_txn_id: req.provider_ref,
            status: CanonicalStatus::Completed,
        })
    });
    mock
}
