//! # ride-api
//!
//! HTTP API layer for ridehail-rs.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Cookie-session authentication with rider, driver and admin roles
//! - REST endpoints for rides, drivers, payments and the admin panel
//! - Webhook handler for Stripe payment events
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/api/auth/register` | Register rider or driver |
//! | POST | `/api/auth/login` | Log in, sets session cookie |
//! | POST | `/api/auth/logout` | Log out |
//! | GET | `/api/auth/me` | Current account |
//! | PUT | `/api/users/profile` | Update name/phone |
//! | PUT | `/api/users/location` | Update location |
//! | GET | `/api/drivers/nearby?location=` | Bookable drivers near a location |
//! | GET | `/api/drivers/me` | Own driver profile |
//! | PUT | `/api/drivers/availability` | Go online/offline |
//! | PUT | `/api/drivers/location` | Update driver location |
//! | GET | `/api/drivers/earnings` | Earnings summary |
//! | POST | `/api/rides` | Request a ride |
//! | GET | `/api/rides` | Own rides |
//! | GET | `/api/rides/{id}` | Ride detail |
//! | POST | `/api/rides/{id}/accept` | Driver accepts |
//! | POST | `/api/rides/{id}/start` | Driver starts |
//! | POST | `/api/rides/{id}/cancel` | Cancel |
//! | POST | `/api/payments/intent` | Create PaymentIntent |
//! | POST | `/api/payments/confirm` | Confirm payment |
//! | GET | `/api/admin/stats` | Dashboard counters |
//! | GET | `/api/admin/{users,drivers,rides,payments}` | Listings |
//! | PUT | `/api/admin/drivers/{id}/verify` | Verify a driver |
//! | POST | `/webhook/stripe` | Stripe webhook |

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::SESSION_COOKIE;
pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
pub use state::{AppConfig, AppState};
