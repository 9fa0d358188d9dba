//! # Ride Types
//!
//! Ride records and the lifecycle rules that govern status changes.
//!
//! ```text
//! requested ──► accepted ──► in_progress ──► completed   (payment only)
//!     │             │              │
//!     └─────────────┴──────────────┴────────► cancelled
//! ```

use crate::error::{RideError, RideResult};
use crate::money::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Ride status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    /// Rider booked a driver
    #[default]
    Requested,
    /// Driver acknowledged the booking
    Accepted,
    /// Rider picked up
    InProgress,
    /// Paid and finished
    Completed,
    /// Called off by rider or driver
    Cancelled,
}

impl RideStatus {
    pub const ALL: [RideStatus; 5] = [
        RideStatus::Requested,
        RideStatus::Accepted,
        RideStatus::InProgress,
        RideStatus::Completed,
        RideStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Requested => "requested",
            RideStatus::Accepted => "accepted",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }

    /// The driver stays unavailable while a ride is in one of these states
    pub fn is_outstanding(&self) -> bool {
        matches!(
            self,
            RideStatus::Requested | RideStatus::Accepted | RideStatus::InProgress
        )
    }

    /// Forward-only transitions. `Completed` is reached through payment
    /// confirmation, never through a plain status update.
    pub fn can_transition_to(&self, next: RideStatus) -> bool {
        use RideStatus::*;
        matches!(
            (self, next),
            (Requested, Accepted)
                | (Accepted, InProgress)
                | (Requested, Completed)
                | (Accepted, Completed)
                | (InProgress, Completed)
                | (Requested, Cancelled)
                | (Accepted, Cancelled)
                | (InProgress, Cancelled)
        )
    }
}

impl FromStr for RideStatus {
    type Err = RideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RideStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| RideError::Serialization(format!("Unknown ride status: {}", s)))
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment state of a ride
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = RideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(RideError::Serialization(format!(
                "Unknown payment status: {}",
                other
            ))),
        }
    }
}

/// A ride between one rider and one driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: i64,
    pub rider_id: i64,
    pub driver_id: i64,
    pub pickup: String,
    pub dropoff: String,
    pub fare: Price,
    pub status: RideStatus,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    /// Check a status change against the lifecycle rules
    pub fn ensure_transition(&self, next: RideStatus) -> RideResult<()> {
        if next == RideStatus::Cancelled && self.payment_status == PaymentStatus::Paid {
            return Err(RideError::AlreadyPaid { ride_id: self.id });
        }
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(RideError::InvalidTransition {
                ride_id: self.id,
                from: self.status.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// A ride can be paid while it is outstanding and unpaid
    pub fn ensure_payable(&self) -> RideResult<()> {
        if self.payment_status == PaymentStatus::Paid {
            return Err(RideError::AlreadyPaid { ride_id: self.id });
        }
        self.ensure_transition(RideStatus::Completed)
    }
}

/// Rider's booking request
#[derive(Debug, Clone, Deserialize)]
pub struct RideRequest {
    pub driver_id: i64,
    pub pickup: String,
    pub dropoff: String,
}

impl RideRequest {
    pub fn validate(self) -> RideResult<Self> {
        let pickup = self.pickup.trim().to_string();
        let dropoff = self.dropoff.trim().to_string();
        if pickup.is_empty() || dropoff.is_empty() {
            return Err(RideError::InvalidRequest(
                "Pickup and dropoff are required".to_string(),
            ));
        }
        if pickup.eq_ignore_ascii_case(&dropoff) {
            return Err(RideError::InvalidRequest(
                "Pickup and dropoff must differ".to_string(),
            ));
        }
        Ok(Self {
            driver_id: self.driver_id,
            pickup,
            dropoff,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    fn ride(status: RideStatus, payment_status: PaymentStatus) -> Ride {
        Ride {
            id: 9,
            rider_id: 1,
            driver_id: 2,
            pickup: "Airport".to_string(),
            dropoff: "Harbor".to_string(),
            fare: Price::from_cents(1500, Currency::USD),
            status,
            payment_status,
            payment_intent_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_forward_transitions() {
        assert!(RideStatus::Requested.can_transition_to(RideStatus::Accepted));
        assert!(RideStatus::Accepted.can_transition_to(RideStatus::InProgress));
        assert!(RideStatus::InProgress.can_transition_to(RideStatus::Cancelled));
        assert!(!RideStatus::InProgress.can_transition_to(RideStatus::Accepted));
        assert!(!RideStatus::Completed.can_transition_to(RideStatus::Cancelled));
        assert!(!RideStatus::Cancelled.can_transition_to(RideStatus::Requested));
    }

    #[test]
    fn test_outstanding() {
        assert!(RideStatus::Requested.is_outstanding());
        assert!(RideStatus::InProgress.is_outstanding());
        assert!(!RideStatus::Completed.is_outstanding());
        assert!(!RideStatus::Cancelled.is_outstanding());
    }

    #[test]
    fn test_status_parse() {
        for status in RideStatus::ALL {
            assert_eq!(status.as_str().parse::<RideStatus>().unwrap(), status);
        }
        assert!("teleported".parse::<RideStatus>().is_err());
    }

    #[test]
    fn test_paid_ride_cannot_be_cancelled() {
        let paid = ride(RideStatus::Completed, PaymentStatus::Paid);
        assert!(matches!(
            paid.ensure_transition(RideStatus::Cancelled),
            Err(RideError::AlreadyPaid { ride_id: 9 })
        ));
    }

    #[test]
    fn test_ensure_payable() {
        assert!(ride(RideStatus::Requested, PaymentStatus::Pending)
            .ensure_payable()
            .is_ok());
        assert!(matches!(
            ride(RideStatus::Cancelled, PaymentStatus::Pending).ensure_payable(),
            Err(RideError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_ride_request_validation() {
        let ok = RideRequest {
            driver_id: 1,
            pickup: " Airport ".to_string(),
            dropoff: "Harbor".to_string(),
        }
        .validate()
        .unwrap();
        assert_eq!(ok.pickup, "Airport");

        let same = RideRequest {
            driver_id: 1,
            pickup: "Harbor".to_string(),
            dropoff: "harbor".to_string(),
        };
        assert!(same.validate().is_err());
    }
}
