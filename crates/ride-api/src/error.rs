//! # API Errors
//!
//! Every handler returns `Result<_, ApiError>`; the error renders as a JSON
//! `ErrorResponse` with the status from `RideError::status_code`.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ride_core::RideError;
use ride_db::DbError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub RideError);

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        Self(err.into())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.status_code();
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = if status.is_server_error() {
            error!(error = %self.0, code, "Request failed");
            let message = match &self.0 {
                RideError::Provider { .. } | RideError::Network(_) => "Payment provider unavailable",
                _ => "Internal server error",
            };
            ErrorResponse::new(message, code)
        } else {
            ErrorResponse::new(self.0.to_string(), code)
        };

        (status, Json(body)).into_response()
    }
}

/// `Json` extractor whose rejections use `ErrorResponse`
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> Response {
    let status = rejection.status();
    let body = ErrorResponse::new("Invalid request body", status.as_u16())
        .with_details(rejection.body_text());
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::new("Test error", 400).with_details("field x");
        assert_eq!(err.error, "Test error");
        assert_eq!(err.code, 400);
        assert_eq!(err.details.as_deref(), Some("field x"));
    }

    #[test]
    fn test_status_mapping() {
        let response = ApiError(RideError::AlreadyPaid { ride_id: 1 }).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = ApiError(RideError::Unauthorized("no session".into())).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = ApiError::from(DbError::Corrupt("bad row".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
