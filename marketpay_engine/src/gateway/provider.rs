use async_trait::async_trait;

use crate::{
    db_types::ProviderTag,
    gateway::{
        CancelRequest,
        CancelResult,
        ConfirmRequest,
        ConfirmResult,
        IntentRequest,
        IntentResult,
        ProviderError,
        StatusResult,
    },
};

/// The uniform contract every payment processor adapter exposes.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// The tag that payments use to select this adapter.
    fn tag(&self) -> ProviderTag;

    /// Registers a charge with processors that hand the buyer a client secret (payment intents), before the buyer
    /// pays. Processors whose checkout creates the transaction on their side return `None`, which is the default.
    async fn create_intent(&self, _request: IntentRequest) -> Result<Option<IntentResult>, ProviderError> {
        Ok(None)
    }

    /// Asks the processor to capture the payment identified by `request.provider_ref`.
    ///
    /// Any failure, including a processor-side decline, is a [`ProviderError`].
    async fn confirm(&self, request: ConfirmRequest) -> Result<ConfirmResult, ProviderError>;

    /// Fetches the processor's current view of a transaction. Has no side effects.
    async fn query(&self, external_txn_id: &str) -> Result<StatusResult, ProviderError>;

    /// Reverses a completed charge.
    async fn cancel(&self, request: CancelRequest) -> Result<CancelResult, ProviderError>;
}
