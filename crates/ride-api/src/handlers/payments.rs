//! Ride payments through PaymentIntents.
//!
//! ```text
//! POST /api/payments/intent   → intent created, client_secret to the app
//! (app confirms with the Stripe SDK)
//! POST /api/payments/confirm  → intent re-read from Stripe, ride paid atomically
//! ```

use crate::auth::RiderUser;
use crate::error::{ApiJson, ApiResult};
use crate::state::AppState;
use axum::{extract::State, Json};
use ride_core::{
    DriverEarning, Payment, PaymentIntentRequest, Price, Ride, RideError, User,
};
use ride_db::PaymentReceipt;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    pub ride_id: i64,
}

#[derive(Debug, Serialize)]
pub struct CreateIntentResponse {
    pub payment_intent_id: String,
    pub client_secret: String,
    pub amount: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publishable_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub ride_id: i64,
    pub payment_intent_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmPaymentResponse {
    pub ride: Ride,
    pub payment: Payment,
    pub earning: DriverEarning,
}

/// Rides can only be paid by the rider who booked them
async fn own_ride(state: &AppState, rider: &User, ride_id: i64) -> ApiResult<Ride> {
    let ride = state
        .db
        .rides()
        .find(ride_id)
        .await?
        .ok_or_else(|| RideError::not_found("ride", ride_id))?;

    if ride.rider_id != rider.id {
        return Err(RideError::Forbidden("Ride belongs to another rider".to_string()).into());
    }
    Ok(ride)
}

#[instrument(skip_all)]
pub async fn create_intent(
    State(state): State<AppState>,
    RiderUser(rider): RiderUser,
    ApiJson(request): ApiJson<CreateIntentRequest>,
) -> ApiResult<Json<CreateIntentResponse>> {
    let ride = own_ride(&state, &rider, request.ride_id).await?;
    ride.ensure_payable()?;

    let intent = state
        .gateway
        .create_payment_intent(&PaymentIntentRequest::for_ride(ride.id, ride.fare).with_email(&rider.email))
        .await?;

    let client_secret = intent.client_secret.clone().ok_or_else(|| RideError::Provider {
        provider: state.gateway.provider_name().to_string(),
        message: format!("Intent {} has no client secret", intent.id),
    })?;

    state
        .db
        .rides()
        .attach_payment_intent(ride.id, &intent.id)
        .await?;

    info!(ride_id = ride.id, intent_id = %intent.id, amount = %ride.fare.display(), "Payment intent created");

    Ok(Json(CreateIntentResponse {
        payment_intent_id: intent.id,
        client_secret,
        amount: ride.fare,
        publishable_key: state.gateway.publishable_key().map(str::to_string),
    }))
}

/// Re-read the intent from the provider and record the payment if it
/// succeeded for this ride
#[instrument(skip_all)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    RiderUser(rider): RiderUser,
    ApiJson(request): ApiJson<ConfirmPaymentRequest>,
) -> ApiResult<Json<ConfirmPaymentResponse>> {
    let ride = own_ride(&state, &rider, request.ride_id).await?;
    ride.ensure_payable()?;

    let intent = state
        .gateway
        .retrieve_payment_intent(&request.payment_intent_id)
        .await?;

    if intent.ride_id() != Some(ride.id) {
        warn!(
            ride_id = ride.id,
            intent_ride = ?intent.ride_id(),
            "Payment intent belongs to a different ride"
        );
        return Err(RideError::InvalidRequest(format!(
            "Payment intent {} was not created for ride {}",
            intent.id, ride.id
        ))
        .into());
    }

    if !intent.is_succeeded() {
        return Err(RideError::PaymentIncomplete {
            reason: format!("payment intent status is {}", intent.status.as_str()),
        }
        .into());
    }

    let confirmation = state
        .db
        .payments()
        .confirm_ride_payment(
            &PaymentReceipt {
                ride_id: ride.id,
                user_id: rider.id,
                provider_payment_id: intent.id,
                amount: intent.amount,
            },
            state.config.commission_bps,
        )
        .await?;

    Ok(Json(ConfirmPaymentResponse {
        ride: confirmation.ride,
        payment: confirmation.payment,
        earning: confirmation.earning,
    }))
}
