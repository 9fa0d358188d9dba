//! Registration, login and logout.

use crate::auth::{expired_session_cookie, session_cookie, session_token, CurrentUser};
use crate::error::{ApiJson, ApiResult};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use ride_core::{Driver, RegisterRequest, User};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The logged-in account, with the driver profile for drivers
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<Driver>,
}

async fn account(state: &AppState, user: User) -> ApiResult<AccountResponse> {
    let driver = if user.is_driver() {
        state.db.drivers().find_by_user(user.id).await?
    } else {
        None
    };
    Ok(AccountResponse { user, driver })
}

/// Register a rider or driver and log them in
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, CookieJar, Json<AccountResponse>)> {
    let request = request.validate()?;
    let (user, driver) = state.db.users().register(&request).await?;
    let session = state.db.sessions().create(user.id, state.session_ttl()).await?;

    info!(user_id = user.id, role = %user.role, "User registered");

    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(&state, session.token)),
        Json(AccountResponse { user, driver }),
    ))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<(CookieJar, Json<AccountResponse>)> {
    let user = state
        .db
        .users()
        .authenticate(&request.email, &request.password)
        .await?;
    let session = state.db.sessions().create(user.id, state.session_ttl()).await?;

    info!(user_id = user.id, "User logged in");

    let body = account(&state, user).await?;
    Ok((jar.add(session_cookie(&state, session.token)), Json(body)))
}

pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> ApiResult<(CookieJar, StatusCode)> {
    if let Some(token) = session_token(&jar) {
        state.db.sessions().delete(&token).await?;
    }
    info!(user_id = user.id, "User logged out");
    Ok((jar.remove(expired_session_cookie()), StatusCode::NO_CONTENT))
}

pub async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<AccountResponse>> {
    Ok(Json(account(&state, user).await?))
}
