//! # Routes
//!
//! Axum router configuration for the ridehail API.

use crate::handlers::{self, admin, auth, drivers, payments, rides, users, webhook};
use crate::state::AppState;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Create the main application router
///
/// Routes:
/// - `/api/auth`: register, login, logout, me
/// - `/api/users`: profile and location
/// - `/api/drivers`: nearby search, driver dashboard, earnings
/// - `/api/rides`: booking and lifecycle
/// - `/api/payments`: PaymentIntent creation and confirmation
/// - `/api/admin`: stats, listings, driver verification
/// - `/webhook/stripe`: Stripe events
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(state.config.cors_allowed_origin.as_deref());

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let user_routes = Router::new()
        .route("/profile", put(users::update_profile))
        .route("/location", put(users::update_location));

    let driver_routes = Router::new()
        .route("/nearby", get(drivers::nearby))
        .route("/me", get(drivers::me))
        .route("/availability", put(drivers::set_availability))
        .route("/location", put(drivers::update_location))
        .route("/earnings", get(drivers::earnings));

    let ride_routes = Router::new()
        .route("/", post(rides::request_ride).get(rides::list_rides))
        .route("/{ride_id}", get(rides::get_ride))
        .route("/{ride_id}/accept", post(rides::accept_ride))
        .route("/{ride_id}/start", post(rides::start_ride))
        .route("/{ride_id}/cancel", post(rides::cancel_ride));

    let payment_routes = Router::new()
        .route("/intent", post(payments::create_intent))
        .route("/confirm", post(payments::confirm_payment));

    let admin_routes = Router::new()
        .route("/stats", get(admin::stats))
        .route("/users", get(admin::list_users))
        .route("/drivers", get(admin::list_drivers))
        .route("/drivers/{driver_id}/verify", put(admin::verify_driver))
        .route("/rides", get(admin::list_rides))
        .route("/payments", get(admin::list_payments));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/drivers", driver_routes)
        .nest("/rides", ride_routes)
        .nest("/payments", payment_routes)
        .nest("/admin", admin_routes)
        .layer(cors);

    // Webhooks take the raw body and skip CORS
    let webhook_routes = Router::new().route("/stripe", post(webhook::stripe_webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api", api_routes)
        .nest("/webhook", webhook_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Credentialed CORS for one origin, or permissive CORS when none is set
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]),
        Some(Err(_)) => {
            warn!("CORS_ALLOWED_ORIGIN is not a valid header value, allowing any origin");
            permissive_cors()
        }
        None => permissive_cors(),
    }
}

fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
