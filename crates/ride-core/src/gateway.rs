//! # Payment Gateway Trait
//!
//! Seam between the API and the payment provider.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PaymentGateway (trait)                   │
//! │  ├── create_payment_intent()                                │
//! │  ├── retrieve_payment_intent()                              │
//! │  ├── cancel_payment_intent()                                │
//! │  ├── verify_webhook()                                       │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                 ┌──────────┴──────────┐
//!          ┌──────┴───────┐     ┌───────┴───────┐
//!          │ StripePayment│     │  test fakes   │
//!          │   Gateway    │     │               │
//!          └──────────────┘     └───────────────┘
//! ```

use crate::error::RideResult;
use crate::money::{Currency, Price};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Metadata key carrying the ride ID on provider objects
pub const RIDE_ID_METADATA_KEY: &str = "ride_id";

/// Core trait for payment provider implementations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent the mobile client confirms with its SDK.
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> RideResult<PaymentIntent>;

    /// Fetch the current state of a payment intent.
    async fn retrieve_payment_intent(&self, intent_id: &str) -> RideResult<PaymentIntent>;

    /// Cancel an intent that has not been paid.
    async fn cancel_payment_intent(&self, intent_id: &str) -> RideResult<PaymentIntent>;

    /// Verify a webhook signature and parse the event.
    ///
    /// # Arguments
    /// * `payload` - Raw webhook body bytes
    /// * `signature` - Signature header from the request
    async fn verify_webhook(&self, payload: &[u8], signature: &str) -> RideResult<WebhookEvent>;

    /// Get the provider name (for logging and storage).
    fn provider_name(&self) -> &'static str;

    /// Key the mobile SDK needs alongside the client secret.
    fn publishable_key(&self) -> Option<&str> {
        None
    }
}

/// Type alias for a shared gateway (dynamic dispatch)
pub type SharedPaymentGateway = Arc<dyn PaymentGateway>;

/// Everything needed to charge for one ride
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentRequest {
    pub ride_id: i64,
    pub amount: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    /// Repeated calls with the same key return the same intent
    pub idempotency_key: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntentRequest {
    pub fn for_ride(ride_id: i64, amount: Price) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(RIDE_ID_METADATA_KEY.to_string(), ride_id.to_string());
        Self {
            ride_id,
            amount,
            customer_email: None,
            idempotency_key: format!("ride-{}-{}", ride_id, amount.amount),
            metadata,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.customer_email = Some(email.into());
        self
    }

}

/// Provider-side intent status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

impl PaymentIntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentIntentStatus::RequiresPaymentMethod => "requires_payment_method",
            PaymentIntentStatus::RequiresConfirmation => "requires_confirmation",
            PaymentIntentStatus::RequiresAction => "requires_action",
            PaymentIntentStatus::Processing => "processing",
            PaymentIntentStatus::RequiresCapture => "requires_capture",
            PaymentIntentStatus::Canceled => "canceled",
            PaymentIntentStatus::Succeeded => "succeeded",
            PaymentIntentStatus::Unknown => "unknown",
        }
    }
}

/// A payment intent as reported by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Only present on freshly created or retrieved intents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub amount: Price,
    pub status: PaymentIntentStatus,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    pub fn is_succeeded(&self) -> bool {
        self.status == PaymentIntentStatus::Succeeded
    }

    /// Money has moved or is moving; the intent can no longer be canceled
    pub fn is_settling(&self) -> bool {
        matches!(
            self.status,
            PaymentIntentStatus::Succeeded | PaymentIntentStatus::Processing
        )
    }

    /// The ride this intent was created for, if tagged
    pub fn ride_id(&self) -> Option<i64> {
        self.metadata
            .get(RIDE_ID_METADATA_KEY)
            .and_then(|v| v.parse().ok())
    }
}

/// Webhook event types we care about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// Payment intent succeeded
    PaymentSucceeded,
    /// Payment attempt failed
    PaymentFailed,
    /// Intent canceled
    PaymentCanceled,
    /// Refund issued
    RefundIssued,
    /// Unknown event (passthrough)
    Unknown(String),
}

/// A parsed webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID from provider
    pub event_id: String,

    /// Event type
    pub event_type: WebhookEventType,

    /// Provider name
    pub provider: String,

    /// Related payment intent ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,

    /// Amount (in smallest unit)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,

    /// Currency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,

    /// Object metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,

    /// Raw event data (for debugging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl WebhookEvent {
    pub fn ride_id(&self) -> Option<i64> {
        self.metadata
            .get(RIDE_ID_METADATA_KEY)
            .and_then(|v| v.parse().ok())
    }
}
