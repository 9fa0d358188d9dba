//! # Stripe Payment Intents
//!
//! `PaymentGateway` implementation over Stripe's PaymentIntents API.
//! The mobile client confirms the intent with the Stripe SDK using the
//! returned client secret; the server then re-reads the intent before
//! marking the ride as paid.

use crate::config::StripeConfig;
use crate::webhook::{parse_event, verify_signature};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response};
use ride_core::{
    Currency, PaymentGateway, PaymentIntent, PaymentIntentRequest, PaymentIntentStatus, Price,
    RideError, RideResult, WebhookEvent,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, error, info, instrument};

const PROVIDER: &str = "stripe";

/// Stripe PaymentIntents gateway
pub struct StripePaymentGateway {
    config: StripeConfig,
    client: Client,
}

impl StripePaymentGateway {
    /// Create a new gateway
    pub fn new(config: StripeConfig) -> RideResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RideError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> RideResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    /// Build form data for `POST /v1/payment_intents`
    fn intent_form(request: &PaymentIntentRequest) -> Vec<(String, String)> {
        let mut form_params: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount.amount.to_string()),
            (
                "currency".to_string(),
                request.amount.currency.as_str().to_string(),
            ),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
            (
                "description".to_string(),
                format!("Ride #{}", request.ride_id),
            ),
        ];

        if let Some(ref email) = request.customer_email {
            form_params.push(("receipt_email".to_string(), email.clone()));
        }

        let mut keys: Vec<_> = request.metadata.keys().collect();
        keys.sort();
        for key in keys {
            form_params.push((format!("metadata[{}]", key), request.metadata[key].clone()));
        }

        form_params
    }

    /// Read a Stripe response, mapping error bodies to `RideError::Provider`
    async fn read_response<T: DeserializeOwned>(response: Response) -> RideResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RideError::Network(e.to_string()))?;

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);

            if let Ok(error_response) = serde_json::from_str::<StripeErrorResponse>(&body) {
                return Err(RideError::Provider {
                    provider: PROVIDER.to_string(),
                    message: error_response.error.describe(),
                });
            }

            return Err(RideError::Provider {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            RideError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

#[async_trait]
impl PaymentGateway for StripePaymentGateway {
    #[instrument(skip(self, request), fields(ride_id = request.ride_id, amount = request.amount.amount))]
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> RideResult<PaymentIntent> {
        if request.amount.amount <= 0 {
            return Err(RideError::InvalidRequest(
                "Payment amount must be positive".to_string(),
            ));
        }

        let form_params = Self::intent_form(request);
        debug!("Creating Stripe payment intent: {} params", form_params.len());

        let url = format!("{}/v1/payment_intents", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&form_params)
            .send()
            .await
            .map_err(|e| RideError::Network(e.to_string()))?;

        let intent: StripePaymentIntent = Self::read_response(response).await?;
        info!(
            "Created Stripe payment intent: id={}, status={}",
            intent.id, intent.status.as_str()
        );

        intent.into_intent()
    }

    #[instrument(skip(self))]
    async fn retrieve_payment_intent(&self, intent_id: &str) -> RideResult<PaymentIntent> {
        check_intent_id(intent_id)?;

        let url = format!("{}/v1/payment_intents/{}", self.config.api_base_url, intent_id);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .send()
            .await
            .map_err(|e| RideError::Network(e.to_string()))?;

        let intent: StripePaymentIntent = Self::read_response(response).await?;
        debug!("Retrieved payment intent {}: {}", intent.id, intent.status.as_str());

        intent.into_intent()
    }

    #[instrument(skip(self))]
    async fn cancel_payment_intent(&self, intent_id: &str) -> RideResult<PaymentIntent> {
        check_intent_id(intent_id)?;

        let url = format!(
            "{}/v1/payment_intents/{}/cancel",
            self.config.api_base_url, intent_id
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .form(&[("cancellation_reason", "abandoned")])
            .send()
            .await
            .map_err(|e| RideError::Network(e.to_string()))?;

        let intent: StripePaymentIntent = Self::read_response(response).await?;
        info!("Canceled Stripe payment intent: id={}", intent.id);

        intent.into_intent()
    }

    #[instrument(skip(self, payload, signature))]
    async fn verify_webhook(&self, payload: &[u8], signature: &str) -> RideResult<WebhookEvent> {
        verify_signature(
            &self.config.webhook_secret,
            payload,
            signature,
            self.config.webhook_tolerance_secs,
            Utc::now().timestamp(),
        )?;
        parse_event(payload)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn publishable_key(&self) -> Option<&str> {
        Some(&self.config.publishable_key)
    }
}

/// Intent IDs go into the URL path, so only `pi_` followed by `[A-Za-z0-9_]`
fn check_intent_id(intent_id: &str) -> RideResult<()> {
    let well_formed = intent_id.len() > 3
        && intent_id.starts_with("pi_")
        && intent_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_');

    if well_formed {
        Ok(())
    } else {
        Err(RideError::InvalidRequest(format!(
            "Invalid payment intent id: {}",
            intent_id
        )))
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    amount: i64,
    currency: String,
    status: PaymentIntentStatus,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl StripePaymentIntent {
    fn into_intent(self) -> RideResult<PaymentIntent> {
        let currency: Currency = self.currency.parse().map_err(|_| {
            RideError::Serialization(format!("Unexpected currency from Stripe: {}", self.currency))
        })?;

        Ok(PaymentIntent {
            id: self.id,
            client_secret: self.client_secret,
            amount: Price::from_cents(self.amount, currency),
            status: self.status,
            metadata: self.metadata,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

impl StripeError {
    fn describe(&self) -> String {
        match &self.code {
            Some(code) => format!("{} ({})", self.message, code),
            None => self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer) -> StripePaymentGateway {
        let config = StripeConfig::new("sk_test_abc", "pk_test_xyz", "whsec_test")
            .with_api_base_url(server.uri());
        StripePaymentGateway::new(config).unwrap()
    }

    #[test]
    fn test_intent_form() {
        let request = PaymentIntentRequest::for_ride(5, Price::from_cents(2000, Currency::USD))
            .with_email("rider@example.com");
        let form = StripePaymentGateway::intent_form(&request);

        assert!(form.contains(&("amount".to_string(), "2000".to_string())));
        assert!(form.contains(&("currency".to_string(), "usd".to_string())));
        assert!(form.contains(&("metadata[ride_id]".to_string(), "5".to_string())));
        assert!(form.contains(&("receipt_email".to_string(), "rider@example.com".to_string())));
    }

    #[tokio::test]
    async fn test_create_payment_intent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(header("Authorization", "Bearer sk_test_abc"))
            .and(header("Idempotency-Key", "ride-5-2000"))
            .and(body_string_contains("amount=2000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pi_123",
                "object": "payment_intent",
                "amount": 2000,
                "currency": "usd",
                "status": "requires_payment_method",
                "client_secret": "pi_123_secret_abc",
                "metadata": { "ride_id": "5" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = PaymentIntentRequest::for_ride(5, Price::from_cents(2000, Currency::USD));
        let intent = gateway(&server).create_payment_intent(&request).await.unwrap();

        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.client_secret.as_deref(), Some("pi_123_secret_abc"));
        assert_eq!(intent.amount.amount, 2000);
        assert_eq!(intent.status, PaymentIntentStatus::RequiresPaymentMethod);
        assert_eq!(intent.ride_id(), Some(5));
    }

    #[tokio::test]
    async fn test_provider_error_is_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "error": { "message": "Your card was declined.", "code": "card_declined" }
            })))
            .mount(&server)
            .await;

        let request = PaymentIntentRequest::for_ride(1, Price::from_cents(500, Currency::USD));
        let err = gateway(&server)
            .create_payment_intent(&request)
            .await
            .unwrap_err();

        match err {
            RideError::Provider { provider, message } => {
                assert_eq!(provider, "stripe");
                assert!(message.contains("card_declined"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_retrieve_payment_intent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/payment_intents/pi_456"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pi_456",
                "amount": 1500,
                "currency": "usd",
                "status": "succeeded",
                "metadata": { "ride_id": "3" }
            })))
            .mount(&server)
            .await;

        let intent = gateway(&server)
            .retrieve_payment_intent("pi_456")
            .await
            .unwrap();
        assert!(intent.is_succeeded());
        assert_eq!(intent.ride_id(), Some(3));
        assert!(intent.client_secret.is_none());
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let server = MockServer::start().await;
        let request = PaymentIntentRequest::for_ride(1, Price::from_cents(0, Currency::USD));
        assert!(matches!(
            gateway(&server).create_payment_intent(&request).await,
            Err(RideError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_malformed_intent_id() {
        let server = MockServer::start().await;
        let gateway = gateway(&server);
        for id in ["../v1/charges", "pi_x/../../customers", "pi_", "pi_a?expand=x", "pi_%2F"] {
            assert!(
                matches!(
                    gateway.retrieve_payment_intent(id).await,
                    Err(RideError::InvalidRequest(_))
                ),
                "accepted {id}"
            );
            assert!(gateway.cancel_payment_intent(id).await.is_err());
        }
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_payment_intent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents/pi_456/cancel"))
            .and(body_string_contains("cancellation_reason=abandoned"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pi_456",
                "amount": 1500,
                "currency": "usd",
                "status": "canceled",
                "metadata": { "ride_id": "3" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let intent = gateway(&server).cancel_payment_intent("pi_456").await.unwrap();
        assert_eq!(intent.status, PaymentIntentStatus::Canceled);
    }
}
