//! # Session Authentication
//!
//! The session token travels in the `ridehail_session` cookie. Extractors
//! resolve it to a user and enforce the role a route needs.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use ride_core::{Driver, RideError, Role, User};
use tracing::debug;

/// Session cookie name
pub const SESSION_COOKIE: &str = "ridehail_session";

/// Cookie carrying a freshly issued session token
pub fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.is_production())
        .max_age(cookie::time::Duration::hours(state.config.session_ttl_hours))
        .build()
}

/// Cookie that clears the session on the client
pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

pub fn session_token(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Any logged-in user
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = session_token(&jar)
            .ok_or_else(|| RideError::Unauthorized("Not logged in".to_string()))?;

        let user = state.db.sessions().lookup(&token).await?.ok_or_else(|| {
            debug!("Rejected unknown or expired session");
            RideError::Unauthorized("Session expired".to_string())
        })?;

        Ok(CurrentUser(user))
    }
}

/// A logged-in rider
pub struct RiderUser(pub User);

impl FromRequestParts<AppState> for RiderUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != Role::Rider {
            return Err(RideError::Forbidden("Rider account required".to_string()).into());
        }
        Ok(RiderUser(user))
    }
}

/// A logged-in driver together with their driver profile
pub struct DriverUser {
    pub user: User,
    pub driver: Driver,
}

impl FromRequestParts<AppState> for DriverUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_driver() {
            return Err(RideError::Forbidden("Driver account required".to_string()).into());
        }

        let driver = state
            .db
            .drivers()
            .find_by_user(user.id)
            .await?
            .ok_or_else(|| RideError::not_found("driver profile", user.id))?;

        Ok(DriverUser { user, driver })
    }
}

/// A logged-in admin
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(RideError::Forbidden("Admin access required".to_string()).into());
        }
        Ok(AdminUser(user))
    }
}
