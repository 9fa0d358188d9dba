//! # ridehail
//!
//! Ride-hailing backend server.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export STRIPE_SECRET_KEY=sk_test_...
//! export STRIPE_PUBLISHABLE_KEY=pk_test_...
//! export STRIPE_WEBHOOK_SECRET=whsec_...
//! export DATABASE_URL=sqlite://ridehail.db
//!
//! # Run the server (LOG_FORMAT=json for structured logs)
//! ridehail
//! ```

use ride_api::{routes, AppConfig, AppState};
use ride_core::RideError;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    let addr = config.socket_addr()?;
    let is_prod = config.is_production();

    let state = AppState::new(config).await?;

    info!("Environment: {}", state.config.environment);
    info!("Payment provider: {}", state.gateway.provider_name());
    info!(
        "Platform commission: {} bps, currency: {}",
        state.config.commission_bps, state.config.currency
    );

    bootstrap_admin(&state).await?;

    let purged = state.db.sessions().purge_expired().await?;
    if purged > 0 {
        info!("Purged {} expired sessions", purged);
    }

    let app = routes::create_router(state);

    info!("ridehail starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Webhook: POST http://{}/webhook/stripe", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

/// Create the admin account from ADMIN_EMAIL/ADMIN_PASSWORD on first start
async fn bootstrap_admin(state: &AppState) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&state.config.admin_email, &state.config.admin_password)
    else {
        return Ok(());
    };

    match state.db.users().create_admin("Administrator", email, password).await {
        Ok(admin) => info!(user_id = admin.id, "Admin account created"),
        Err(err) => match RideError::from(err) {
            RideError::EmailTaken { .. } => info!("Admin account already exists"),
            other => {
                warn!("Failed to create admin account: {}", other);
                return Err(other.into());
            }
        },
    }
    Ok(())
}
