//! # Ride Error Types
//!
//! Typed error handling for the ridehail backend.
//! Domain, storage and payment operations all surface `Result<T, RideError>`.

use thiserror::Error;

/// Core error type for all ride operations
#[derive(Debug, Error)]
pub enum RideError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Request data failed validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No valid session, or bad credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to do this
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Entity lookup failed
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Email already registered
    #[error("Email already registered: {email}")]
    EmailTaken { email: String },

    /// Driver is on another ride or offline
    #[error("Driver {driver_id} is not available")]
    DriverUnavailable { driver_id: i64 },

    /// Driver still has a ride that has not finished
    #[error("Driver {driver_id} has an outstanding ride ({ride_id})")]
    OutstandingRide { driver_id: i64, ride_id: i64 },

    /// Ride status change not allowed from the current status
    #[error("Ride {ride_id} cannot move from {from} to {to}")]
    InvalidTransition {
        ride_id: i64,
        from: String,
        to: String,
    },

    /// Ride already carries a confirmed payment
    #[error("Ride {ride_id} is already paid")]
    AlreadyPaid { ride_id: i64 },

    /// A payment for the ride is settling at the provider
    #[error("Ride {ride_id} has a payment in progress")]
    PaymentInProgress { ride_id: i64 },

    /// Provider reports the payment did not succeed
    #[error("Payment not completed: {reason}")]
    PaymentIncomplete { reason: String },

    /// Payment provider API error
    #[error("Provider error [{provider}]: {message}")]
    Provider { provider: String, message: String },

    /// Network/HTTP error communicating with provider
    #[error("Network error: {0}")]
    Network(String),

    /// Webhook signature verification failed
    #[error("Webhook verification failed: {0}")]
    WebhookVerificationFailed(String),

    /// Webhook payload parsing error
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Storage layer failure
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RideError {
    /// Shorthand for a `NotFound` error
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        RideError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RideError::Network(_) | RideError::Provider { .. } | RideError::Database(_)
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            RideError::Configuration(_) => 500,
            RideError::InvalidRequest(_) => 400,
            RideError::Unauthorized(_) => 401,
            RideError::Forbidden(_) => 403,
            RideError::NotFound { .. } => 404,
            RideError::EmailTaken { .. } => 409,
            RideError::DriverUnavailable { .. } => 409,
            RideError::OutstandingRide { .. } => 409,
            RideError::InvalidTransition { .. } => 409,
            RideError::AlreadyPaid { .. } => 409,
            RideError::PaymentInProgress { .. } => 409,
            RideError::PaymentIncomplete { .. } => 402,
            RideError::Provider { .. } => 502,
            RideError::Network(_) => 503,
            RideError::WebhookVerificationFailed(_) => 401,
            RideError::WebhookParse(_) => 400,
            RideError::Database(_) => 500,
            RideError::Serialization(_) => 500,
            RideError::Internal(_) => 500,
        }
    }
}

/// Result type alias for ride operations
pub type RideResult<T> = Result<T, RideError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(RideError::Network("timeout".into()).is_retryable());
        assert!(RideError::Provider {
            provider: "stripe".into(),
            message: "overloaded".into()
        }
        .is_retryable());
        assert!(!RideError::InvalidRequest("bad data".into()).is_retryable());
        assert!(RideError::Database("database is locked".into()).is_retryable());
        assert!(!RideError::AlreadyPaid { ride_id: 1 }.is_retryable());
        assert!(!RideError::InvalidTransition {
            ride_id: 1,
            from: "cancelled".into(),
            to: "completed".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(RideError::InvalidRequest("test".into()).status_code(), 400);
        assert_eq!(RideError::not_found("ride", 7).status_code(), 404);
        assert_eq!(
            RideError::DriverUnavailable { driver_id: 3 }.status_code(),
            409
        );
        assert_eq!(RideError::PaymentInProgress { ride_id: 2 }.status_code(), 409);
        assert_eq!(
            RideError::PaymentIncomplete {
                reason: "requires_payment_method".into()
            }
            .status_code(),
            402
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = RideError::not_found("driver", 42);
        assert_eq!(err.to_string(), "driver not found: 42");
    }
}
