use serde_json::Value;

use crate::{
    db::traits::{OrderManagement, PaymentGatewayError, PaymentManagement, PaymentTransition, WebhookOutcome},
    db_types::{CanonicalStatus, NewPayment, Payment, PaymentId},
};

/// This trait defines the highest level of behaviour for backends supporting the payment engine.
///
/// Every method that touches more than one record does so in a single atomic transaction. Status changes are
/// conditional on the record still being in the status the caller expects, so that of two racing callers exactly
/// one wins and the other sees a conflict.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone + OrderManagement + PaymentManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new `Pending` payment.
    ///
    /// Returns `DuplicatePayment` if the order already has an active payment, including one inserted concurrently
    /// by another caller.
    async fn insert_pending_payment(&self, payment: NewPayment) -> Result<Payment, PaymentGatewayError>;

    /// Records the id the provider has assigned to a `Pending` payment before it is confirmed, so that status
    /// notifications for it can be matched. The payment must not carry an id yet.
    ///
    /// Returns `PaymentStatusConflict` if the payment is no longer `Pending` or was attached concurrently.
    async fn attach_external_txn_id(
        &self,
        payment_id: PaymentId,
        external_txn_id: &str,
        raw_response: Value,
    ) -> Result<Payment, PaymentGatewayError>;

    /// In a single atomic transaction,
    /// * moves the payment from `Pending` to `Completed`, recording the provider transaction id, the provider's
    ///   response and the time of payment,
    /// * moves the order to `Confirmed` if it is not there already.
    ///
    /// If the payment is no longer `Pending`, nothing is written and `PaymentStatusConflict` is returned. The charge
    /// has already been taken when this is called, so if the order cannot be confirmed the payment is still completed,
    /// the order is left alone and the refusal is returned in [`PaymentTransition::order_conflict`].
    async fn complete_payment(
        &self,
        payment_id: PaymentId,
        external_txn_id: &str,
        raw_response: Value,
    ) -> Result<PaymentTransition, PaymentGatewayError>;

    /// Moves the payment from `Pending` to `Failed`, storing the error record. The order is untouched.
    async fn fail_payment(&self, payment_id: PaymentId, raw_response: Value) -> Result<Payment, PaymentGatewayError>;

    /// In a single atomic transaction,
    /// * moves the payment from `Completed` to `Refunded`, recording the provider's response and the time of refund,
    /// * moves the order to `Cancelled` if it is not there already.
    ///
    /// As with [`complete_payment`](Self::complete_payment), an order that can no longer be cancelled does not stop
    /// the refund from being recorded.
    async fn refund_payment(
        &self,
        payment_id: PaymentId,
        raw_response: Value,
    ) -> Result<PaymentTransition, PaymentGatewayError>;

    /// Applies a provider-reported outcome to the payment carrying `external_txn_id`, driving the order status along
    /// with it, in a single atomic transaction.
    ///
    /// Re-delivering an outcome that has already been applied is a no-op. If the order cannot follow the outcome,
    /// nothing is written and `InvalidTransition` is returned.
    async fn apply_canonical_status(
        &self,
        external_txn_id: &str,
        status: CanonicalStatus,
    ) -> Result<WebhookOutcome, PaymentGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }
}
