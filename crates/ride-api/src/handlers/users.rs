//! Profile and location updates for the logged-in user.

use crate::auth::CurrentUser;
use crate::error::{ApiJson, ApiResult};
use crate::state::AppState;
use axum::{extract::State, Json};
use ride_core::{ProfileUpdate, RideError, User};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LocationUpdate {
    pub location: String,
}

impl LocationUpdate {
    pub(crate) fn validated(&self) -> Result<&str, RideError> {
        let location = self.location.trim();
        if location.is_empty() {
            return Err(RideError::InvalidRequest("Location is required".to_string()));
        }
        Ok(location)
    }
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<User>> {
    let update = update.validate()?;
    Ok(Json(state.db.users().update_profile(user.id, &update).await?))
}

pub async fn update_location(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(update): ApiJson<LocationUpdate>,
) -> ApiResult<Json<User>> {
    let location = update.validated()?;
    Ok(Json(state.db.users().update_location(user.id, location).await?))
}
