//! # Application State
//!
//! Shared state for the Axum application.
//! Contains the database, payment gateway, fare estimator and configuration.

use anyhow::Context;
use ride_core::{
    Currency, FareConfig, RandomFareEstimator, SharedFareEstimator, SharedPaymentGateway,
    DEFAULT_COMMISSION_BPS,
};
use ride_db::Database;
use ride_stripe::StripePaymentGateway;
use std::net::SocketAddr;
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// SQLite URL or path
    pub database_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Session lifetime
    pub session_ttl_hours: i64,
    /// Platform share of each fare, in basis points
    pub commission_bps: u32,
    /// Currency for fares, earnings and stats
    pub currency: Currency,
    /// Explicit fare config file; the default locations are searched otherwise
    pub fare_config_path: Option<String>,
    /// Allowed CORS origin; any origin when unset
    pub cors_allowed_origin: Option<String>,
    /// Admin account created at startup if it does not exist yet
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl AppConfig {
    /// Load from `.env` and environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let commission_bps = match env("PLATFORM_COMMISSION_BPS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|bps| *bps <= 10_000)
                .with_context(|| format!("PLATFORM_COMMISSION_BPS must be 0..=10000, got {}", raw))?,
            None => defaults.commission_bps,
        };

        let currency = match env("CURRENCY") {
            Some(raw) => raw.parse::<Currency>()?,
            None => defaults.currency,
        };

        let session_ttl_hours = match env("SESSION_TTL_HOURS") {
            Some(raw) => parse_session_ttl(&raw)?,
            None => defaults.session_ttl_hours,
        };

        Ok(Self {
            host: env("HOST").unwrap_or(defaults.host),
            port: env("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            database_url: env("DATABASE_URL").unwrap_or(defaults.database_url),
            environment: env("ENVIRONMENT").unwrap_or(defaults.environment),
            session_ttl_hours,
            commission_bps,
            currency,
            fare_config_path: env("FARE_CONFIG"),
            cors_allowed_origin: env("CORS_ALLOWED_ORIGIN"),
            admin_email: env("ADMIN_EMAIL"),
            admin_password: env("ADMIN_PASSWORD"),
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: "sqlite://ridehail.db".to_string(),
            environment: "development".to_string(),
            session_ttl_hours: 24,
            commission_bps: DEFAULT_COMMISSION_BPS,
            currency: Currency::USD,
            fare_config_path: None,
            cors_allowed_origin: None,
            admin_email: None,
            admin_password: None,
        }
    }
}

/// Non-empty environment variable
/// Longest allowed session, one year
pub const MAX_SESSION_TTL_HOURS: i64 = 8_760;

fn parse_session_ttl(raw: &str) -> anyhow::Result<i64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|hours| (1..=MAX_SESSION_TTL_HOURS).contains(hours))
        .with_context(|| {
            format!(
                "SESSION_TTL_HOURS must be between 1 and {}, got {}",
                MAX_SESSION_TTL_HOURS, raw
            )
        })
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub gateway: SharedPaymentGateway,
    pub fares: SharedFareEstimator,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Connect to the database and Stripe using `config`
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let db = Database::new(&config.database_url)
            .await
            .with_context(|| format!("Failed to open database {}", config.database_url))?;

        let gateway = StripePaymentGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;

        let mut fare_config = load_fare_config(config.fare_config_path.as_deref())?;
        if fare_config.currency != config.currency {
            tracing::warn!(
                fare_currency = %fare_config.currency,
                currency = %config.currency,
                "Fare config currency differs from CURRENCY, using CURRENCY"
            );
            fare_config = fare_config.with_currency(config.currency)?;
        }

        Ok(Self::from_parts(
            db,
            Arc::new(gateway),
            Arc::new(RandomFareEstimator::new(fare_config)),
            config,
        ))
    }

    /// Assemble state from ready-made parts
    pub fn from_parts(
        db: Database,
        gateway: SharedPaymentGateway,
        fares: SharedFareEstimator,
        config: AppConfig,
    ) -> Self {
        Self {
            db,
            gateway,
            fares,
            config: Arc::new(config),
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.config.session_ttl_hours)
    }
}

/// Load fare bounds from an explicit path or `config/fares.toml`
fn load_fare_config(explicit: Option<&str>) -> anyhow::Result<FareConfig> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fare config {}", path))?;
        let config = FareConfig::from_toml(&content)?;
        tracing::info!(path, min = config.min_fare, max = config.max_fare, "Loaded fare config");
        return Ok(config);
    }

    let config_paths = [
        "config/fares.toml",
        "../config/fares.toml",
        "../../config/fares.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let config = FareConfig::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            tracing::info!(path, min = config.min_fare, max = config.max_fare, "Loaded fare config");
            return Ok(config);
        }
    }

    tracing::warn!("No fare config found, using defaults");
    Ok(FareConfig::default())
}
