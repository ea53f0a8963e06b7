//! Webhook signature checks.
//!
//! * STRIPE signs `"{timestamp}.{body}"` with HMAC-SHA256 and sends `Stripe-Signature: t={timestamp},v1={hex}`.
//!   Signatures older than [`STRIPE_TOLERANCE_SECS`] are refused.
//! * TOSS signs the raw body with HMAC-SHA256 and sends the base64 digest in `X-Webhook-Signature`.
//!
//! A check only runs when the provider's webhook secret is configured.
use actix_web::HttpRequest;
use chrono::Utc;
use gateway_clients::{stripe::STRIPE, toss::TOSS};
use hmac::{Hmac, Mac};
use log::*;
use marketpay_engine::db_types::ProviderTag;
use sha2::Sha256;

use crate::{config::WebhookConfig, webhooks::WebhookError};

type HmacSha256 = Hmac<Sha256>;

pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const TOSS_SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const STRIPE_TOLERANCE_SECS: i64 = 300;

/// Checks the signature of a notification from `provider`, if a secret for that provider is configured.
pub fn verify_notification(
    provider: &ProviderTag,
    req: &HttpRequest,
    body: &[u8],
    config: &WebhookConfig,
) -> Result<(), WebhookError> {
    let (secret, header_name) = match provider.as_str() {
        STRIPE => (config.stripe_secret.as_ref(), STRIPE_SIGNATURE_HEADER),
        TOSS => (config.toss_secret.as_ref(), TOSS_SIGNATURE_HEADER),
        _ => (None, ""),
    };
    let Some(secret) = secret else {
        trace!("🪝️ No webhook secret for {provider}. Skipping the signature check.");
        return Ok(());
    };
    let header = req
        .headers()
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| WebhookError::InvalidSignature(format!("No {header_name} header")))?;
    match provider.as_str() {
        STRIPE => verify_stripe_signature(header, body, secret.reveal(), Utc::now().timestamp()),
        _ => verify_toss_signature(header, body, secret.reveal()),
    }
}

pub fn verify_stripe_signature(header: &str, body: &[u8], secret: &str, now: i64) -> Result<(), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
            Some(("v1", v)) => signatures.push(v),
            _ => {},
        }
    }
    let timestamp = timestamp.ok_or_else(|| WebhookError::InvalidSignature("No timestamp".into()))?;
    if (now - timestamp).abs() > STRIPE_TOLERANCE_SECS {
        return Err(WebhookError::InvalidSignature(format!("Timestamp {timestamp} is outside the tolerance")));
    }
    let valid = signatures.iter().filter_map(|sig| hex::decode(sig).ok()).any(|sig| {
        stripe_mac(secret, timestamp, body).map(|mac| mac.verify_slice(&sig).is_ok()).unwrap_or(false)
    });
    if valid {
        Ok(())
    } else {
        Err(WebhookError::InvalidSignature("No matching v1 signature".into()))
    }
}

pub fn verify_toss_signature(header: &str, body: &[u8], secret: &str) -> Result<(), WebhookError> {
    let sig = base64::decode(header.trim()).map_err(|e| WebhookError::InvalidSignature(e.to_string()))?;
    let mut mac = new_mac(secret)?;
    mac.update(body);
    mac.verify_slice(&sig).map_err(|_| WebhookError::InvalidSignature("Digest mismatch".into()))
}

/// The `v1` value STRIPE would send for `body` at `timestamp`.
pub fn stripe_signature(secret: &str, timestamp: i64, body: &[u8]) -> Result<String, WebhookError> {
    let mac = stripe_mac(secret, timestamp, body)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// The `X-Webhook-Signature` value TOSS would send for `body`.
pub fn toss_signature(secret: &str, body: &[u8]) -> Result<String, WebhookError> {
    let mut mac = new_mac(secret)?;
    mac.update(body);
    Ok(base64::encode(mac.finalize().into_bytes()))
}

fn stripe_mac(secret: &str, timestamp: i64, body: &[u8]) -> Result<HmacSha256, WebhookError> {
    let mut mac = new_mac(secret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}

fn new_mac(secret: &str) -> Result<HmacSha256, WebhookError> {
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| WebhookError::InvalidSignature(e.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    const BODY: &[u8] = br#"{"type":"payment_intent.succeeded"}"#;

    #[test]
    fn stripe_signatures() {
        let now = 1_700_000_000;
        let sig = stripe_signature("whsec_test", now, BODY).unwrap();
        let header = format!("t={now},v1={sig}");
        assert!(verify_stripe_signature(&header, BODY, "whsec_test", now + 10).is_ok());
        // Stripe may send several signatures while a secret is being rolled
        let header = format!("t={now},v1=00ff,v1={sig}");
        assert!(verify_stripe_signature(&header, BODY, "whsec_test", now).is_ok());
        assert!(verify_stripe_signature(&header, BODY, "whsec_other", now).is_err());
        assert!(verify_stripe_signature(&header, b"{}", "whsec_test", now).is_err());
        let err = verify_stripe_signature(&header, BODY, "whsec_test", now + 301).unwrap_err();
        assert!(err.to_string().contains("tolerance"), "{err}");
        assert!(verify_stripe_signature(&format!("v1={sig}"), BODY, "whsec_test", now).is_err());
    }

    #[test]
    fn toss_signatures() {
        let sig = toss_signature("toss_secret", BODY).unwrap();
        assert!(verify_toss_signature(&sig, BODY, "toss_secret").is_ok());
        assert!(verify_toss_signature(&sig, BODY, "wrong").is_err());
        assert!(verify_toss_signature("not base64!", BODY, "toss_secret").is_err());
    }
}
