//! # Stripe Webhook Handling
//!
//! Signature verification, event parsing and handler dispatch.
//! Stripe signs `"{timestamp}.{payload}"` with HMAC-SHA256 and sends
//! `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>...]`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ride_core::{Currency, RideError, RideResult, WebhookEvent, WebhookEventType};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

// =============================================================================
// Signature Verification
// =============================================================================

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_signature_header(header: &str) -> RideResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        RideError::WebhookVerificationFailed("Missing timestamp in signature".to_string())
    })?;

    if signatures.is_empty() {
        return Err(RideError::WebhookVerificationFailed(
            "No v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// Hex-encoded HMAC-SHA256 over `"{timestamp}.{payload}"`
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Verify a `Stripe-Signature` header against the raw payload.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    tolerance_secs: u64,
    now: i64,
) -> RideResult<()> {
    let parsed = parse_signature_header(header)?;

    if now.abs_diff(parsed.timestamp) > tolerance_secs {
        return Err(RideError::WebhookVerificationFailed(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    let expected = compute_signature(secret, parsed.timestamp, payload);
    let valid = parsed
        .signatures
        .iter()
        .any(|sig| constant_time_compare(sig, &expected));

    if valid {
        Ok(())
    } else {
        Err(RideError::WebhookVerificationFailed(
            "Signature mismatch".to_string(),
        ))
    }
}

// =============================================================================
// Event Parsing
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Map<String, serde_json::Value>,
}

fn map_event_type(event_type: &str) -> WebhookEventType {
    match event_type {
        "payment_intent.succeeded" => WebhookEventType::PaymentSucceeded,
        "payment_intent.payment_failed" => WebhookEventType::PaymentFailed,
        "payment_intent.canceled" => WebhookEventType::PaymentCanceled,
        "charge.refunded" => WebhookEventType::RefundIssued,
        other => WebhookEventType::Unknown(other.to_string()),
    }
}

/// Parse a verified payload into a `WebhookEvent`
pub fn parse_event(payload: &[u8]) -> RideResult<WebhookEvent> {
    let event: StripeWebhookEvent = serde_json::from_slice(payload)
        .map_err(|e| RideError::WebhookParse(format!("Failed to parse webhook: {}", e)))?;

    debug!("Verified Stripe webhook: type={}", event.event_type);

    let object = &event.data.object;
    let object_kind = object.get("object").and_then(|v| v.as_str());

    // Payment intents carry their own id; charges point at theirs
    let payment_intent_id = match object_kind {
        Some("payment_intent") => object.get("id"),
        _ => object.get("payment_intent"),
    }
    .and_then(|v| v.as_str())
    .map(String::from);

    let amount = object.get("amount").and_then(|v| v.as_i64());

    let currency = object
        .get("currency")
        .and_then(|v| v.as_str())
        .and_then(|c| c.parse::<Currency>().ok());

    let metadata: HashMap<String, String> = object
        .get("metadata")
        .and_then(|m| m.as_object())
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    Ok(WebhookEvent {
        event_id: event.id,
        event_type: map_event_type(&event.event_type),
        provider: "stripe".to_string(),
        payment_intent_id,
        amount,
        currency,
        metadata,
        raw_data: Some(serde_json::Value::Object(event.data.object)),
        timestamp: DateTime::from_timestamp(event.created, 0).unwrap_or_else(Utc::now),
    })
}

// =============================================================================
// Dispatch
// =============================================================================

/// Webhook event handler trait
///
/// Implement this trait to react to payment events. Every method defaults
/// to logging only.
#[async_trait]
#[allow(unused_variables)]
pub trait WebhookHandler: Send + Sync {
    /// Called when a payment intent succeeds
    async fn on_payment_succeeded(&self, event: &WebhookEvent) -> RideResult<()> {
        info!(
            "Payment succeeded: intent={:?}, ride={:?}",
            event.payment_intent_id,
            event.ride_id()
        );
        Ok(())
    }

    /// Called when a payment attempt fails
    async fn on_payment_failed(&self, event: &WebhookEvent) -> RideResult<()> {
        warn!("Payment failed: intent={:?}", event.payment_intent_id);
        Ok(())
    }

    /// Called when an intent is canceled
    async fn on_payment_canceled(&self, event: &WebhookEvent) -> RideResult<()> {
        info!("Payment canceled: intent={:?}", event.payment_intent_id);
        Ok(())
    }

    /// Called when a refund is issued
    async fn on_refund_issued(&self, event: &WebhookEvent) -> RideResult<()> {
        info!("Refund issued: intent={:?}", event.payment_intent_id);
        Ok(())
    }

    /// Called for unknown/unhandled events
    async fn on_unknown_event(&self, event: &WebhookEvent) -> RideResult<()> {
        debug!("Unhandled webhook event: {:?}", event.event_type);
        Ok(())
    }
}

/// Dispatch a webhook event to the appropriate handler method
pub async fn dispatch_webhook_event(
    handler: &dyn WebhookHandler,
    event: &WebhookEvent,
) -> RideResult<()> {
    match &event.event_type {
        WebhookEventType::PaymentSucceeded => handler.on_payment_succeeded(event).await,
        WebhookEventType::PaymentFailed => handler.on_payment_failed(event).await,
        WebhookEventType::PaymentCanceled => handler.on_payment_canceled(event).await,
        WebhookEventType::RefundIssued => handler.on_refund_issued(event).await,
        WebhookEventType::Unknown(_) => handler.on_unknown_event(event).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    const SECRET: &str = "whsec_test";

    fn succeeded_payload() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "created": 1_700_000_000,
            "data": {
                "object": {
                    "id": "pi_789",
                    "object": "payment_intent",
                    "amount": 2500,
                    "currency": "usd",
                    "status": "succeeded",
                    "metadata": { "ride_id": "14" }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_signature_header() {
        let parsed = parse_signature_header("t=1234567890,v1=abc123,v1=def456,v0=old").unwrap();
        assert_eq!(parsed.timestamp, 1234567890);
        assert_eq!(parsed.signatures, vec!["abc123", "def456"]);

        assert!(parse_signature_header("v1=abc").is_err());
        assert!(parse_signature_header("t=123").is_err());
    }

    #[test]
    fn test_verify_signature_roundtrip() {
        let payload = succeeded_payload();
        let now = 1_700_000_100;
        let sig = compute_signature(SECRET, now, &payload);
        assert_eq!(sig.len(), 64);

        let header = format!("t={},v1={}", now, sig);
        assert!(verify_signature(SECRET, &payload, &header, 300, now).is_ok());
    }

    #[test]
    fn test_verify_signature_rejects_tampering() {
        let payload = succeeded_payload();
        let now = 1_700_000_100;
        let header = format!("t={},v1={}", now, compute_signature(SECRET, now, &payload));

        let mut tampered = payload.clone();
        tampered.extend_from_slice(b" ");
        assert!(verify_signature(SECRET, &tampered, &header, 300, now).is_err());
        assert!(verify_signature("whsec_other", &payload, &header, 300, now).is_err());
    }

    #[test]
    fn test_verify_signature_rejects_stale_timestamp() {
        let payload = succeeded_payload();
        let signed_at = 1_700_000_000;
        let header = format!("t={},v1={}", signed_at, compute_signature(SECRET, signed_at, &payload));
        assert!(matches!(
            verify_signature(SECRET, &payload, &header, 300, signed_at + 301),
            Err(RideError::WebhookVerificationFailed(_))
        ));
    }

    #[test]
    fn test_verify_signature_extreme_timestamp() {
        let payload = succeeded_payload();
        let now = 1_700_000_000;
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={},v1=aa", t);
            assert!(matches!(
                verify_signature(SECRET, &payload, &header, 300, now),
                Err(RideError::WebhookVerificationFailed(_))
            ));
        }
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc123", "abc123"));
        assert!(!constant_time_compare("abc123", "abc124"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_parse_payment_intent_event() {
        let event = parse_event(&succeeded_payload()).unwrap();
        assert_eq!(event.event_type, WebhookEventType::PaymentSucceeded);
        assert_eq!(event.payment_intent_id.as_deref(), Some("pi_789"));
        assert_eq!(event.amount, Some(2500));
        assert_eq!(event.currency, Some(Currency::USD));
        assert_eq!(event.ride_id(), Some(14));
    }

    #[test]
    fn test_parse_charge_event_uses_payment_intent_field() {
        let payload = serde_json::to_vec(&json!({
            "id": "evt_2",
            "type": "charge.refunded",
            "created": 1_700_000_000,
            "data": { "object": { "id": "ch_1", "object": "charge", "payment_intent": "pi_9" } }
        }))
        .unwrap();
        let event = parse_event(&payload).unwrap();
        assert_eq!(event.event_type, WebhookEventType::RefundIssued);
        assert_eq!(event.payment_intent_id.as_deref(), Some("pi_9"));
    }

    #[tokio::test]
    async fn test_dispatch_webhook() {
        struct TestHandler {
            called: AtomicBool,
        }

        #[async_trait]
        impl WebhookHandler for TestHandler {
            async fn on_payment_succeeded(&self, _event: &WebhookEvent) -> RideResult<()> {
                self.called.store(true, Ordering::SeqCst);
                Ok(())
            }
        }

        let handler = TestHandler {
            called: AtomicBool::new(false),
        };

        let event = parse_event(&succeeded_payload()).unwrap();
        dispatch_webhook_event(&handler, &event).await.unwrap();

        assert!(handler.called.load(Ordering::SeqCst));
    }
}
