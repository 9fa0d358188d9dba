//! # ride-core
//!
//! Core types and traits for the ridehail backend.
//!
//! This crate provides:
//! - `User`, `Role` and registration validation
//! - `Driver` profiles and location matching helpers
//! - `Ride` with its status lifecycle (`RideStatus`, `PaymentStatus`)
//! - `Payment`, `DriverEarning` and the commission split
//! - `FareEstimator` for the placeholder fare
//! - `PaymentGateway` trait for payment providers
//! - `RideError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use ride_core::{FareEstimator, PaymentGateway, PaymentIntentRequest, RandomFareEstimator};
//!
//! let fare = RandomFareEstimator::new(FareConfig::default()).estimate("Airport", "Harbor");
//! let ride = rides.request(rider.id, &request, fare).await?;
//!
//! let intent = gateway
//!     .create_payment_intent(&PaymentIntentRequest::for_ride(ride.id, ride.fare))
//!     .await?;
//!
//! // Hand intent.client_secret to the mobile SDK
//! ```

pub mod driver;
pub mod error;
pub mod fare;
pub mod gateway;
pub mod money;
pub mod payment;
pub mod ride;
pub mod stats;
pub mod user;

// Re-exports for convenience
pub use driver::{fold_location, normalize_location_query, Driver};
pub use error::{RideError, RideResult};
pub use fare::{
    FareConfig, FareEstimator, FixedFareEstimator, RandomFareEstimator, SharedFareEstimator,
};
pub use gateway::{
    PaymentGateway, PaymentIntent, PaymentIntentRequest, PaymentIntentStatus,
    SharedPaymentGateway, WebhookEvent, WebhookEventType, RIDE_ID_METADATA_KEY,
};
pub use money::{Currency, Price};
pub use payment::{
    DriverEarning, EarningsSplit, EarningsSummary, Payment, DEFAULT_COMMISSION_BPS,
};
pub use ride::{PaymentStatus, Ride, RideRequest, RideStatus};
pub use stats::AdminStats;
pub use user::{ProfileUpdate, RegisterRequest, Role, User, VehicleDetails};
