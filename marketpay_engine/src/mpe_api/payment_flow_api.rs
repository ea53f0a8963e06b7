use std::{fmt::Debug, future::Future, sync::Arc, time::Duration};

use log::*;
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    db::traits::{PaymentGatewayDatabase, PaymentGatewayError, PaymentTransition, WebhookOutcome},
    db_types::{
        is_valid_currency_code,
        CanonicalStatus,
        NewPayment,
        OrderId,
        Pagination,
        Payment,
        PaymentId,
        PaymentStatus,
        ProviderTag,
    },
    events::{
        EventProducers,
        OrderStatusChangedEvent,
        PaymentCompletedEvent,
        PaymentFailedEvent,
        PaymentRefundedEvent,
    },
    gateway::{
        CancelRequest,
        ConfirmRequest,
        IntentRequest,
        PaymentProvider,
        ProviderError,
        ProviderRegistry,
        StatusResult,
    },
    mpe_api::errors::PaymentFlowError,
    state_machine::TransitionError,
};

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// A pending payment that its provider knows about, and the secret the buyer's browser needs to pay it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub payment: Payment,
    pub client_secret: Option<String>,
}

/// `PaymentFlowApi` orchestrates the life of a payment: creation against an order, confirmation with the payment
/// provider, refunds, and reconciliation with the status updates that providers push to us.
///
/// Payment status changes drive the status of the order they belong to:
///
/// | Payment              | Order                                  |
/// |----------------------|----------------------------------------|
/// | Pending → Completed  | Pending, Paid → Confirmed              |
/// | Pending → Failed     | unchanged                              |
/// | Completed → Refunded | Pending, Paid, Confirmed → Cancelled   |
///
/// Each payment change and the order change it causes are written in one database transaction. No database lock is
/// held while a provider is being called, and every provider call is bounded by a timeout.
pub struct PaymentFlowApi<B> {
    db: B,
    providers: ProviderRegistry,
    producers: EventProducers,
    provider_timeout: Duration,
}

impl<B> Debug for PaymentFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi ({:?})", self.providers)
    }
}

impl<B> PaymentFlowApi<B> {
    pub fn new(db: B, providers: ProviderRegistry, producers: EventProducers) -> Self {
        Self { db, providers, producers, provider_timeout: DEFAULT_PROVIDER_TIMEOUT }
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    fn provider_for(&self, tag: &ProviderTag) -> Result<Arc<dyn PaymentProvider>, PaymentFlowError> {
        self.providers.get(tag).ok_or_else(|| PaymentFlowError::UnsupportedProvider(tag.clone()))
    }

    async fn call_provider<T, F>(&self, tag: &ProviderTag, call: F) -> Result<T, ProviderError>
    where F: Future<Output = Result<T, ProviderError>> {
        match tokio::time::timeout(self.provider_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("🔄️🔌️ {tag} did not respond within {:?}", self.provider_timeout);
                Err(ProviderError::Timeout(self.provider_timeout))
            },
        }
    }
}

impl<B> PaymentFlowApi<B>
where B: PaymentGatewayDatabase
{
    /// Creates a new `Pending` payment for an order. No provider is contacted.
    ///
    /// The amount must equal the order total exactly, the order must not have shipped or been cancelled, and it must
    /// not already have a pending or completed payment.
    pub async fn create_payment(&self, payment: NewPayment) -> Result<Payment, PaymentFlowError> {
        let order_id = payment.order_id;
        let order = self.db.order_by_id(order_id).await?.ok_or(PaymentFlowError::OrderNotFound(order_id))?;
        if payment.amount != order.total_price {
            debug!(
                "🔄️💰️ Payment of {} rejected for order {order_id}, which totals {}",
                payment.amount, order.total_price
            );
            return Err(PaymentFlowError::AmountMismatch { expected: order.total_price, actual: payment.amount });
        }
        if !is_valid_currency_code(&payment.currency) {
            return Err(PaymentFlowError::InvalidRequest(format!("{} is not a currency code", payment.currency)));
        }
        if !payment.currency.eq_ignore_ascii_case(&order.currency) {
            return Err(PaymentFlowError::InvalidRequest(format!(
                "Order {order_id} is priced in {}, not {}",
                order.currency, payment.currency
            )));
        }
        if !self.providers.supports(&payment.provider) {
            return Err(PaymentFlowError::UnsupportedProvider(payment.provider));
        }
        order.status.on_payment_completed()?;
        if self.db.exists_active_for_order(order_id).await? {
            debug!("🔄️💰️ Order {order_id} already has an active payment");
            return Err(PaymentFlowError::DuplicatePayment(order_id));
        }
        let payment = self.db.insert_pending_payment(payment).await?;
        info!("🔄️💰️ Payment {} created for order {order_id} via {}", payment.id, payment.provider);
        Ok(payment)
    }

    /// Registers a pending payment with its provider ahead of confirmation, for providers that work with payment
    /// intents. The provider's id is stored against the payment, so that status notifications for it are matched
    /// even if the buyer never returns to confirm. The client secret is returned but not stored.
    pub async fn create_provider_intent(&self, payment_id: PaymentId) -> Result<PaymentIntent, PaymentFlowError> {
        let payment = self.fetch_payment(payment_id).await?;
        if payment.status != PaymentStatus::Pending {
            return Err(PaymentFlowError::AlreadyProcessed { payment_id, status: payment.status });
        }
        if payment.external_txn_id.is_some() {
            return Err(PaymentFlowError::InvalidState { payment_id, status: payment.status });
        }
        self.check_order_can_be_confirmed(&payment).await?;
        let provider = self.provider_for(&payment.provider)?;
        let request = IntentRequest {
            payment_id,
            order_id: payment.order_id,
            amount: payment.amount,
            currency: payment.currency.clone(),
        };
        trace!("🔄️🧾️ Registering payment {payment_id} with {}", payment.provider);
        let intent = self
            .call_provider(&payment.provider, provider.create_intent(request))
            .await
            .map_err(|e| {
                warn!("🔄️🧾️ {} could not register payment {payment_id}. It remains pending. {e}", payment.provider);
                PaymentFlowError::ProviderError(e)
            })?
            .ok_or_else(|| {
                PaymentFlowError::InvalidRequest(format!("{} does not use payment intents", payment.provider))
            })?;
        let payment = self.db.attach_external_txn_id(payment_id, &intent.external_txn_id, intent.raw_response).await?;
        info!("🔄️🧾️ Payment {payment_id} registered with {} as {}", payment.provider, intent.external_txn_id);
        Ok(PaymentIntent { payment, client_secret: intent.client_secret })
    }

    /// Confirms a pending payment with its provider.
    ///
    /// On success the payment becomes `Completed` and the order `Confirmed`. If the provider fails or declines, the
    /// payment becomes `Failed`, the order is left as it was, and `ConfirmationFailed` is returned. A payment can only
    /// be confirmed once; later attempts fail with `AlreadyProcessed`.
    ///
    /// The provider is not called unless the order can still be confirmed. Should the order move on while the
    /// provider is charging, the charge is recorded and then reversed, and `InvalidTransition` is returned.
    pub async fn confirm_payment(&self, payment_id: PaymentId, provider_ref: &str) -> Result<Payment, PaymentFlowError> {
        let payment = self.fetch_payment(payment_id).await?;
        if payment.status != PaymentStatus::Pending {
            return Err(PaymentFlowError::AlreadyProcessed { payment_id, status: payment.status });
        }
        if let Some(registered) = payment.external_txn_id.as_deref().filter(|id| *id != provider_ref) {
            return Err(PaymentFlowError::InvalidRequest(format!(
                "Payment {payment_id} is registered with {} as {registered}, not {provider_ref}",
                payment.provider
            )));
        }
        self.check_order_can_be_confirmed(&payment).await?;
        let provider = self.provider_for(&payment.provider)?;
        let request = ConfirmRequest {
            provider_ref: provider_ref.to_string(),
            payment_id,
            order_id: payment.order_id,
            amount: payment.amount,
            currency: payment.currency.clone(),
        };
        trace!("🔄️✅️ Confirming payment {payment_id} with {}", payment.provider);
        let result = self.call_provider(&payment.provider, provider.confirm(request)).await;
        let confirmed = match result {
            Ok(c) if c.status == CanonicalStatus::Completed => c,
            Ok(c) => {
                let err = ProviderError::Declined {
                    code: c.status.to_string(),
                    message: format!("Transaction {} was not completed", c.external_txn_id),
                    raw: Some(c.raw_response),
                };
                return Err(self.fail_confirmation(payment, err).await);
            },
            Err(e) => return Err(self.fail_confirmation(payment, e).await),
        };
        let txn_id = confirmed.external_txn_id;
        let transition = match self.db.complete_payment(payment_id, &txn_id, confirmed.raw_response).await {
            Ok(t) => t,
            Err(PaymentGatewayError::PaymentStatusConflict { actual: PaymentStatus::Completed, .. }) => {
                return self.completed_elsewhere(payment_id, &txn_id).await;
            },
            Err(e) => return Err(e.into()),
        };
        self.call_payment_completed_hook(&transition).await;
        if let Some(refused) = transition.order_conflict {
            return Err(self.reverse_charge(transition, refused).await);
        }
        info!(
            "🔄️✅️ Payment {payment_id} completed ({txn_id}). Order {} is {}",
            transition.order.id, transition.order.status
        );
        Ok(transition.payment)
    }

    async fn check_order_can_be_confirmed(&self, payment: &Payment) -> Result<(), PaymentFlowError> {
        let order_id = payment.order_id;
        let order = self.db.order_by_id(order_id).await?.ok_or(PaymentFlowError::OrderNotFound(order_id))?;
        order.status.on_payment_completed().map(|_| ()).map_err(|e| {
            debug!("🔄️✅️ Payment {} cannot be taken. {e}", payment.id);
            PaymentFlowError::InvalidTransition(e)
        })
    }

    /// The payment was completed by a status notification while we were waiting on the provider. If it was the same
    /// transaction, the confirmation succeeded.
    async fn completed_elsewhere(&self, payment_id: PaymentId, txn_id: &str) -> Result<Payment, PaymentFlowError> {
        let payment = self.fetch_payment(payment_id).await?;
        if payment.external_txn_id.as_deref() == Some(txn_id) {
            debug!("🔄️✅️ Payment {payment_id} was already completed by a notification for {txn_id}");
            Ok(payment)
        } else {
            Err(PaymentFlowError::AlreadyProcessed { payment_id, status: payment.status })
        }
    }

    /// Gives back a charge that the order can no longer take. The payment is already `Completed`; it becomes
    /// `Refunded` if the provider accepts the reversal. Returns the error to hand back to the caller.
    async fn reverse_charge(&self, transition: PaymentTransition, refused: TransitionError) -> PaymentFlowError {
        let payment = transition.payment;
        let payment_id = payment.id;
        let order = transition.order;
        warn!(
            "🔄️↩️ Order {} became {} while payment {payment_id} was being charged. Reversing the charge.",
            order.id, order.status
        );
        let reason = format!("Order {} is {} and cannot take the payment", order.id, order.status);
        let outcome = match (self.provider_for(&payment.provider), payment.external_txn_id.clone()) {
            (Ok(provider), Some(external_txn_id)) => {
                let request = CancelRequest {
                    external_txn_id,
                    amount: payment.amount,
                    currency: payment.currency.clone(),
                    reason: reason.clone(),
                };
                self.call_provider(&payment.provider, provider.cancel(request)).await.map_err(|e| e.to_string())
            },
            (Err(e), _) => Err(e.to_string()),
            (_, None) => Err("The payment has no provider transaction id".to_string()),
        };
        let cancelled = match outcome {
            Ok(c) if c.status == CanonicalStatus::Refunded => c,
            Ok(c) => {
                error!(
                    "🔄️↩️ Payment {payment_id} was charged for order {}, and the reversal finished with status {}. \
                     Refund it manually.",
                    order.id, c.status
                );
                return PaymentFlowError::InvalidTransition(refused);
            },
            Err(e) => {
                error!(
                    "🔄️↩️ Payment {payment_id} was charged for order {}, but the charge could not be reversed. Refund it \
                     manually. {e}",
                    order.id
                );
                return PaymentFlowError::InvalidTransition(refused);
            },
        };
        match self.db.refund_payment(payment_id, with_cancel_reason(cancelled.raw_response, &reason)).await {
            Ok(transition) => {
                info!("🔄️↩️ The charge for payment {payment_id} was reversed");
                self.call_payment_refunded_hook(&transition).await;
            },
            Err(e) => error!("🔄️↩️ The charge for payment {payment_id} was reversed, but could not be recorded. {e}"),
        }
        PaymentFlowError::InvalidTransition(refused)
    }

    /// Records a failed confirmation and returns the error to hand back to the caller.
    async fn fail_confirmation(&self, payment: Payment, error: ProviderError) -> PaymentFlowError {
        let payment_id = payment.id;
        warn!("🔄️❌️ Confirmation of payment {payment_id} failed. {error}");
        match self.db.fail_payment(payment_id, error.to_audit_record()).await {
            Ok(failed) => {
                for emitter in &self.producers.payment_failed_producer {
                    emitter.publish_event(PaymentFailedEvent::new(failed.clone(), error.to_string())).await;
                }
                PaymentFlowError::ConfirmationFailed(error)
            },
            Err(PaymentGatewayError::PaymentStatusConflict { actual, .. }) => {
                warn!("🔄️❌️ Payment {payment_id} became {actual} while it was being confirmed. Leaving it as is.");
                PaymentFlowError::AlreadyProcessed { payment_id, status: actual }
            },
            Err(e) => {
                error!("🔄️❌️ Could not record the failure of payment {payment_id}. {e}");
                e.into()
            },
        }
    }

    /// Refunds a completed payment through its provider, and cancels the order.
    ///
    /// If the provider refuses, the payment stays `Completed` and the provider's error is returned. Orders that have
    /// shipped are refused before the provider is called. If the order ships while the provider is refunding, the
    /// refund is still recorded and the order is left as it is.
    pub async fn refund_payment(&self, payment_id: PaymentId, reason: &str) -> Result<Payment, PaymentFlowError> {
        let payment = self.fetch_payment(payment_id).await?;
        if payment.status != PaymentStatus::Completed {
            return Err(PaymentFlowError::InvalidState { payment_id, status: payment.status });
        }
        let order = self
            .db
            .order_by_id(payment.order_id)
            .await?
            .ok_or(PaymentFlowError::OrderNotFound(payment.order_id))?;
        // Refuse before touching the provider if the order can no longer be cancelled
        order.status.on_payment_refunded()?;
        let external_txn_id = payment
            .external_txn_id
            .clone()
            .ok_or(PaymentFlowError::InvalidState { payment_id, status: payment.status })?;
        let provider = self.provider_for(&payment.provider)?;
        let request = CancelRequest {
            external_txn_id,
            amount: payment.amount,
            currency: payment.currency.clone(),
            reason: reason.to_string(),
        };
        trace!("🔄️↩️ Refunding payment {payment_id} with {}", payment.provider);
        let cancelled = self.call_provider(&payment.provider, provider.cancel(request)).await.map_err(|e| {
            warn!("🔄️↩️ Refund of payment {payment_id} failed. The payment remains completed. {e}");
            PaymentFlowError::ProviderError(e)
        })?;
        if cancelled.status != CanonicalStatus::Refunded {
            let e = ProviderError::UnexpectedResponse(format!("Refund finished with status {}", cancelled.status));
            warn!("🔄️↩️ Refund of payment {payment_id} failed. The payment remains completed. {e}");
            return Err(PaymentFlowError::ProviderError(e));
        }
        let raw = with_cancel_reason(cancelled.raw_response, reason);
        let transition = self.db.refund_payment(payment_id, raw).await.map_err(|e| match e {
            PaymentGatewayError::PaymentStatusConflict { actual, .. } => {
                PaymentFlowError::InvalidState { payment_id, status: actual }
            },
            e => e.into(),
        })?;
        let order = &transition.order;
        match transition.order_conflict {
            Some(e) => {
                warn!("🔄️↩️ Payment {payment_id} refunded, but order {} was left {}. {e}", order.id, order.status)
            },
            None => info!("🔄️↩️ Payment {payment_id} refunded. Order {} is {}", order.id, order.status),
        }
        self.call_payment_refunded_hook(&transition).await;
        Ok(transition.payment)
    }

    /// Applies a status reported asynchronously by a provider to the payment carrying `external_txn_id`.
    ///
    /// Re-delivery of a status that has already been applied changes nothing. A status that cannot follow the
    /// payment's current status is ignored with a warning.
    pub async fn apply_webhook_status(
        &self,
        external_txn_id: &str,
        status: CanonicalStatus,
    ) -> Result<WebhookOutcome, PaymentFlowError> {
        let outcome = self.db.apply_canonical_status(external_txn_id, status).await?;
        match &outcome {
            WebhookOutcome::Applied(transition) => {
                info!("🔄️🪝️ {status} applied to payment {} ({external_txn_id})", transition.payment.id);
                match status {
                    CanonicalStatus::Completed => self.call_payment_completed_hook(transition).await,
                    CanonicalStatus::Refunded => self.call_payment_refunded_hook(transition).await,
                    CanonicalStatus::Failed => {
                        for emitter in &self.producers.payment_failed_producer {
                            let event = PaymentFailedEvent::new(transition.payment.clone(), "Reported by provider".into());
                            emitter.publish_event(event).await;
                        }
                    },
                }
            },
            WebhookOutcome::Unchanged(p) => {
                debug!("🔄️🪝️ Payment {} is already {}. Nothing to do.", p.id, p.status);
            },
            WebhookOutcome::Ignored(p) => {
                warn!("🔄️🪝️ Payment {} is {}. {status} reported for {external_txn_id} was ignored.", p.id, p.status);
            },
        }
        Ok(outcome)
    }

    /// Asks the payment's provider for its current view of the transaction. Nothing is written.
    pub async fn query_provider_status(&self, payment_id: PaymentId) -> Result<StatusResult, PaymentFlowError> {
        let payment = self.fetch_payment(payment_id).await?;
        let txn_id = payment
            .external_txn_id
            .as_deref()
            .ok_or(PaymentFlowError::InvalidState { payment_id, status: payment.status })?;
        let provider = self.provider_for(&payment.provider)?;
        self.call_provider(&payment.provider, provider.query(txn_id)).await.map_err(PaymentFlowError::ProviderError)
    }

    pub async fn payment_by_id(&self, payment_id: PaymentId) -> Result<Option<Payment>, PaymentFlowError> {
        Ok(self.db.payment_by_id(payment_id).await?)
    }

    pub async fn payment_by_external_txn_id(&self, txn_id: &str) -> Result<Option<Payment>, PaymentFlowError> {
        Ok(self.db.payment_by_external_txn_id(txn_id).await?)
    }

    pub async fn payments_for_order(
        &self,
        order_id: OrderId,
        page: Pagination,
    ) -> Result<Vec<Payment>, PaymentFlowError> {
        Ok(self.db.payments_for_order(order_id, page).await?)
    }

    async fn fetch_payment(&self, payment_id: PaymentId) -> Result<Payment, PaymentFlowError> {
        self.db.payment_by_id(payment_id).await?.ok_or(PaymentFlowError::PaymentNotFound(payment_id))
    }

    async fn call_payment_completed_hook(&self, transition: &PaymentTransition) {
        for emitter in &self.producers.payment_completed_producer {
            debug!("🔄️📬️ Notifying payment completed hook subscribers");
            let event = PaymentCompletedEvent::new(transition.payment.clone(), transition.order.clone());
            emitter.publish_event(event).await;
        }
        self.call_order_status_changed_hook(transition).await;
    }

    async fn call_payment_refunded_hook(&self, transition: &PaymentTransition) {
        for emitter in &self.producers.payment_refunded_producer {
            debug!("🔄️📬️ Notifying payment refunded hook subscribers");
            let event = PaymentRefundedEvent::new(transition.payment.clone(), transition.order.clone());
            emitter.publish_event(event).await;
        }
        self.call_order_status_changed_hook(transition).await;
    }

    async fn call_order_status_changed_hook(&self, transition: &PaymentTransition) {
        let Some(old_status) = transition.previous_order_status else {
            return;
        };
        for emitter in &self.producers.order_status_changed_producer {
            let event = OrderStatusChangedEvent::new(old_status, transition.order.clone());
            emitter.publish_event(event).await;
        }
    }
}

/// Adds the refund reason to the provider's response before it is stored.
fn with_cancel_reason(raw: Value, reason: &str) -> Value {
    match raw {
        Value::Object(mut map) => {
            map.insert("cancelReason".to_string(), Value::String(reason.to_string()));
            Value::Object(map)
        },
        other => json!({ "response": other, "cancelReason": reason }),
    }
}
