//! Stripe webhook endpoint.
//!
//! `payment_intent.succeeded` confirms the ride it was created for, so a
//! rider who closes the app before calling `/api/payments/confirm` still
//! gets their ride marked paid.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use ride_core::{Price, RideError, RideResult, WebhookEvent};
use ride_db::PaymentReceipt;
use ride_stripe::{dispatch_webhook_event, WebhookHandler};
use tracing::{error, info, instrument, warn};

const SIGNATURE_HEADER: &str = "stripe-signature";

/// Applies provider events to the ride ledger
pub struct RideWebhookHandler<'a> {
    state: &'a AppState,
}

impl<'a> RideWebhookHandler<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    async fn confirm(&self, ride_id: i64, intent_id: &str, amount: Price) -> RideResult<()> {
        let ride = self
            .state
            .db
            .rides()
            .find(ride_id)
            .await?
            .ok_or_else(|| RideError::not_found("ride", ride_id))?;

        self.state
            .db
            .payments()
            .confirm_ride_payment(
                &PaymentReceipt {
                    ride_id,
                    user_id: ride.rider_id,
                    provider_payment_id: intent_id.to_string(),
                    amount,
                },
                self.state.config.commission_bps,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl WebhookHandler for RideWebhookHandler<'_> {
    async fn on_payment_succeeded(&self, event: &WebhookEvent) -> RideResult<()> {
        let (Some(ride_id), Some(intent_id)) = (event.ride_id(), event.payment_intent_id.clone())
        else {
            warn!(event_id = %event.event_id, "Succeeded intent carries no ride, ignoring");
            return Ok(());
        };

        let (Some(amount), Some(currency)) = (event.amount, event.currency) else {
            return Err(RideError::WebhookParse(format!(
                "Event {} has no amount or currency",
                event.event_id
            )));
        };

        let amount = Price::from_cents(amount, currency);
        match self.confirm(ride_id, &intent_id, amount).await {
            Ok(()) => {
                info!(ride_id, event_id = %event.event_id, "Ride paid via webhook");
                Ok(())
            }
            // The app already confirmed it
            Err(RideError::AlreadyPaid { .. }) => {
                info!(ride_id, "Ride already paid, webhook is a duplicate");
                Ok(())
            }
            Err(err) if err.is_retryable() => Err(err),
            // Redelivery cannot change the outcome
            Err(err) => {
                warn!(
                    ride_id,
                    intent_id = %intent_id,
                    event_id = %event.event_id,
                    "Succeeded payment cannot be applied to ride: {}",
                    err
                );
                Ok(())
            }
        }
    }
}

/// Handle Stripe webhook
#[instrument(skip(state, headers, body))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| RideError::InvalidRequest("Missing Stripe-Signature header".to_string()))?;

    let event = state.gateway.verify_webhook(&body, signature).await.map_err(|e| {
        error!("Webhook verification failed: {}", e);
        ApiError(e)
    })?;

    info!(
        "Received webhook: type={:?}, id={}",
        event.event_type, event.event_id
    );

    dispatch_webhook_event(&RideWebhookHandler::new(&state), &event)
        .await
        .map_err(|e| {
            error!("Webhook handler error: {}", e);
            ApiError(e)
        })?;

    Ok(StatusCode::OK)
}
