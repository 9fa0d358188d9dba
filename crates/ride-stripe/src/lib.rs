//! # ride-stripe
//!
//! Stripe payment gateway for ridehail-rs.
//!
//! Rides are charged with PaymentIntents: the server creates an intent for
//! the ride fare, the mobile client confirms it with the Stripe SDK, and
//! the server re-reads the intent (or receives a webhook) before recording
//! the payment.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ride_stripe::StripePaymentGateway;
//! use ride_core::{PaymentGateway, PaymentIntentRequest};
//!
//! let gateway = StripePaymentGateway::from_env()?;
//!
//! let intent = gateway
//!     .create_payment_intent(&PaymentIntentRequest::for_ride(ride.id, ride.fare))
//!     .await?;
//!
//! // Send intent.client_secret to the mobile client
//! ```
//!
//! ## Webhook Handling
//!
//! ```rust,ignore
//! use ride_stripe::{dispatch_webhook_event, WebhookHandler};
//!
//! struct MyHandler;
//!
//! #[async_trait]
//! impl WebhookHandler for MyHandler {
//!     async fn on_payment_succeeded(&self, event: &WebhookEvent) -> RideResult<()> {
//!         // Mark the ride paid
//!         Ok(())
//!     }
//! }
//!
//! let event = gateway.verify_webhook(payload, signature).await?;
//! dispatch_webhook_event(&MyHandler, &event).await?;
//! ```

pub mod config;
pub mod intents;
pub mod webhook;

// Re-exports
pub use config::StripeConfig;
pub use intents::StripePaymentGateway;
pub use webhook::{
    compute_signature, dispatch_webhook_event, parse_event, verify_signature, WebhookHandler,
};
