//! Admin panel endpoints.

use super::Listing;
use crate::auth::AdminUser;
use crate::error::{ApiJson, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use ride_core::{AdminStats, Driver, Payment, Ride, User};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default = "default_verified")]
    pub verified: bool,
}

fn default_verified() -> bool {
    true
}

pub async fn stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<AdminStats>> {
    Ok(Json(state.db.stats().admin_stats(state.config.currency).await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Listing<User>>> {
    Ok(Json(state.db.users().list().await?.into()))
}

pub async fn list_drivers(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Listing<Driver>>> {
    Ok(Json(state.db.drivers().list().await?.into()))
}

pub async fn verify_driver(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(driver_id): Path<i64>,
    ApiJson(request): ApiJson<VerifyRequest>,
) -> ApiResult<Json<Driver>> {
    let driver = state
        .db
        .drivers()
        .set_verified(driver_id, request.verified)
        .await?;
    info!(driver_id, verified = driver.verified, admin_id = admin.id, "Driver verification changed");
    Ok(Json(driver))
}

pub async fn list_rides(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Listing<Ride>>> {
    Ok(Json(state.db.rides().list_all().await?.into()))
}

pub async fn list_payments(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Listing<Payment>>> {
    Ok(Json(state.db.payments().list_payments().await?.into()))
}
