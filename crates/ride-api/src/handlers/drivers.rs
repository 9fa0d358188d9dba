//! Driver search and the driver's own dashboard.

use super::users::LocationUpdate;
use super::Listing;
use crate::auth::{CurrentUser, DriverUser};
use crate::error::{ApiJson, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use ride_core::{Driver, EarningsSummary};
use serde::Deserialize;
use tracing::{info, instrument};

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityUpdate {
    pub available: bool,
}

/// Verified, available drivers whose location contains the query
#[instrument(skip_all)]
pub async fn nearby(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Query(query): Query<NearbyQuery>,
) -> ApiResult<Json<Listing<Driver>>> {
    let drivers = state.db.drivers().nearby(&query.location).await?;
    Ok(Json(drivers.into()))
}

pub async fn me(driver: DriverUser) -> Json<Driver> {
    Json(driver.driver)
}

pub async fn set_availability(
    State(state): State<AppState>,
    DriverUser { driver, .. }: DriverUser,
    ApiJson(update): ApiJson<AvailabilityUpdate>,
) -> ApiResult<Json<Driver>> {
    let driver = state
        .db
        .drivers()
        .set_availability(driver.id, update.available)
        .await?;
    info!(driver_id = driver.id, available = driver.available, "Driver availability changed");
    Ok(Json(driver))
}

pub async fn update_location(
    State(state): State<AppState>,
    DriverUser { driver, .. }: DriverUser,
    ApiJson(update): ApiJson<LocationUpdate>,
) -> ApiResult<Json<Driver>> {
    let location = update.validated()?;
    Ok(Json(state.db.drivers().update_location(driver.id, location).await?))
}

pub async fn earnings(
    State(state): State<AppState>,
    DriverUser { driver, .. }: DriverUser,
) -> ApiResult<Json<EarningsSummary>> {
    let summary = state
        .db
        .payments()
        .earnings_for_driver(driver.id, state.config.currency)
        .await?;
    Ok(Json(summary))
}
