//! Ride booking and lifecycle.

use super::Listing;
use crate::auth::{CurrentUser, DriverUser, RiderUser};
use crate::error::{ApiJson, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use ride_core::{PaymentIntentStatus, Ride, RideError, RideRequest, RideStatus, User};
use tracing::{info, instrument, warn};

/// Load a ride the caller takes part in (admins see every ride)
pub(crate) async fn participant_ride(state: &AppState, user: &User, ride_id: i64) -> ApiResult<Ride> {
    let ride = state
        .db
        .rides()
        .find(ride_id)
        .await?
        .ok_or_else(|| RideError::not_found("ride", ride_id))?;

    if user.is_admin() || ride.rider_id == user.id {
        return Ok(ride);
    }

    if user.is_driver() {
        if let Some(driver) = state.db.drivers().find_by_user(user.id).await? {
            if driver.id == ride.driver_id {
                return Ok(ride);
            }
        }
    }

    Err(RideError::Forbidden("Not a participant in this ride".to_string()).into())
}

/// Book a driver; the fare is estimated here
#[instrument(skip_all)]
pub async fn request_ride(
    State(state): State<AppState>,
    RiderUser(rider): RiderUser,
    ApiJson(request): ApiJson<RideRequest>,
) -> ApiResult<(StatusCode, Json<Ride>)> {
    let request = request.validate()?;
    let fare = state.fares.estimate(&request.pickup, &request.dropoff);
    let ride = state.db.rides().request(rider.id, &request, fare).await?;
    Ok((StatusCode::CREATED, Json(ride)))
}

/// The caller's rides: as driver for drivers, as rider otherwise
pub async fn list_rides(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Listing<Ride>>> {
    let rides = if user.is_driver() {
        match state.db.drivers().find_by_user(user.id).await? {
            Some(driver) => state.db.rides().list_for_driver(driver.id).await?,
            None => Vec::new(),
        }
    } else {
        state.db.rides().list_for_rider(user.id).await?
    };
    Ok(Json(rides.into()))
}

pub async fn get_ride(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(ride_id): Path<i64>,
) -> ApiResult<Json<Ride>> {
    Ok(Json(participant_ride(&state, &user, ride_id).await?))
}

pub async fn accept_ride(
    State(state): State<AppState>,
    DriverUser { driver, .. }: DriverUser,
    Path(ride_id): Path<i64>,
) -> ApiResult<Json<Ride>> {
    let ride = state
        .db
        .rides()
        .advance(ride_id, driver.id, RideStatus::Accepted)
        .await?;
    Ok(Json(ride))
}

pub async fn start_ride(
    State(state): State<AppState>,
    DriverUser { driver, .. }: DriverUser,
    Path(ride_id): Path<i64>,
) -> ApiResult<Json<Ride>> {
    let ride = state
        .db
        .rides()
        .advance(ride_id, driver.id, RideStatus::InProgress)
        .await?;
    Ok(Json(ride))
}

/// Cancel a ride. An attached payment intent is canceled at the provider
/// first; a ride whose payment is settling cannot be cancelled.
#[instrument(skip_all)]
pub async fn cancel_ride(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(ride_id): Path<i64>,
) -> ApiResult<Json<Ride>> {
    let ride = participant_ride(&state, &user, ride_id).await?;
    ride.ensure_transition(RideStatus::Cancelled)?;

    if let Some(intent_id) = ride.payment_intent_id.as_deref() {
        release_payment_intent(&state, ride_id, intent_id).await?;
    }

    let ride = state
        .db
        .rides()
        .cancel(ride_id, ride.payment_intent_id.as_deref())
        .await?;
    info!(ride_id, cancelled_by = user.id, "Ride cancelled by participant");
    Ok(Json(ride))
}

/// Make sure an intent can never be charged
async fn release_payment_intent(state: &AppState, ride_id: i64, intent_id: &str) -> ApiResult<()> {
    let intent = state.gateway.retrieve_payment_intent(intent_id).await?;

    if intent.is_settling() {
        warn!(ride_id, intent_id, status = intent.status.as_str(), "Refusing to cancel a ride being paid");
        return Err(RideError::PaymentInProgress { ride_id }.into());
    }

    if intent.status != PaymentIntentStatus::Canceled {
        state.gateway.cancel_payment_intent(intent_id).await?;
    }
    Ok(())
}
