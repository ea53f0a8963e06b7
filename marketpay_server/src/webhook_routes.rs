//----------------------------------------------   Webhooks  ----------------------------------------------------

use actix_web::{web, HttpRequest, HttpResponse};
use log::*;
use marketpay_engine::{db_types::ProviderTag, PaymentFlowApi, PaymentFlowError, PaymentGatewayDatabase, WebhookOutcome};

use crate::{
    config::WebhookConfig,
    data_objects::JsonResponse,
    route,
    webhooks::{parse_notification, signatures::verify_notification, Notification},
};

route!(payment_webhook => Post "/payments/webhook/{provider}" impl PaymentGatewayDatabase);
/// Route handler for provider notifications
///
/// Providers post status changes for their transactions here, with the provider's name as the last path segment
/// (`/payments/webhook/toss`, `/payments/webhook/nicepay` or `/payments/webhook/stripe`).
///
/// Webhook responses must always be in the 200 range, otherwise providers keep retrying. The body reports whether the
/// notification was used.
pub async fn payment_webhook<B>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    api: web::Data<PaymentFlowApi<B>>,
    config: web::Data<WebhookConfig>,
) -> HttpResponse
where
    B: PaymentGatewayDatabase,
{
    let provider = ProviderTag::new(path.into_inner());
    trace!("🪝️ Received {provider} webhook request: {}", req.uri());
    if let Err(e) = verify_notification(&provider, &req, body.as_ref(), config.as_ref()) {
        warn!("🪝️ Rejected {provider} notification. {e}");
        return HttpResponse::Ok().json(JsonResponse::failure(e));
    }
    let notification = match parse_notification(&provider, body.as_ref()) {
        Ok(n) => n,
        Err(e) => {
            warn!("🪝️ Could not read {provider} notification. {e}");
            return HttpResponse::Ok().json(JsonResponse::failure(e));
        },
    };
    let result = apply_notification(&provider, notification, api.as_ref()).await;
    HttpResponse::Ok().json(result)
}

async fn apply_notification<B: PaymentGatewayDatabase>(
    provider: &ProviderTag,
    notification: Notification,
    api: &PaymentFlowApi<B>,
) -> JsonResponse {
    let Notification { external_txn_id, native_status, status } = notification;
    let Some(status) = status else {
        warn!("🪝️ {provider} reported {native_status} for {external_txn_id}, which has no canonical status. Ignoring.");
        return JsonResponse::success(format!("Status {native_status} ignored."));
    };
    debug!("🪝️ {provider} reported {native_status} ({status}) for {external_txn_id}");
    match api.apply_webhook_status(&external_txn_id, status).await {
        Ok(WebhookOutcome::Applied(transition)) => {
            info!("🪝️ Payment {} is now {}", transition.payment.id, transition.payment.status);
            JsonResponse::success(format!("Payment {} updated.", transition.payment.id))
        },
        Ok(WebhookOutcome::Unchanged(payment)) => {
            JsonResponse::success(format!("Payment {} is already {}.", payment.id, payment.status))
        },
        Ok(WebhookOutcome::Ignored(payment)) => {
            JsonResponse::success(format!("Payment {} is {}. Notification ignored.", payment.id, payment.status))
        },
        Err(e @ PaymentFlowError::TransactionNotFound(_)) => {
            warn!("🪝️ {provider} notification for an unknown transaction. {e}");
            JsonResponse::failure(e)
        },
        Err(e) => {
            error!("🪝️ Could not apply {provider} notification for {external_txn_id}. {e}");
            JsonResponse::failure(format!("Could not apply notification. {e}"))
        },
    }
}
