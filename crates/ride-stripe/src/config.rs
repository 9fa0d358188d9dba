//! # Stripe Configuration
//!
//! Secrets come from the environment (or `.env`), never from config files.

use ride_core::RideError;
use std::env;
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_API_VERSION: &str = "2024-12-18.acacia";

/// Stripe API configuration
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_test_... or sk_live_...)
    pub secret_key: String,

    /// Publishable key (pk_test_... or pk_live_...), handed to the mobile SDK
    pub publishable_key: String,

    /// Webhook signing secret (whsec_...)
    pub webhook_secret: String,

    /// API base URL (overridable for testing/mocking)
    pub api_base_url: String,

    /// Pinned API version
    pub api_version: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Accepted clock skew for webhook timestamps
    pub webhook_tolerance_secs: u64,
}

impl StripeConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `STRIPE_SECRET_KEY`
    /// - `STRIPE_PUBLISHABLE_KEY`
    /// - `STRIPE_WEBHOOK_SECRET`
    ///
    /// Optional: `STRIPE_API_BASE_URL`.
    pub fn from_env() -> Result<Self, RideError> {
        dotenvy::dotenv().ok();

        let config = Self::new(
            required_var("STRIPE_SECRET_KEY")?,
            required_var("STRIPE_PUBLISHABLE_KEY")?,
            required_var("STRIPE_WEBHOOK_SECRET")?,
        );
        let config = match env::var("STRIPE_API_BASE_URL") {
            Ok(url) if !url.is_empty() => config.with_api_base_url(url),
            _ => config,
        };

        config.validate()
    }

    /// Create config with explicit values
    pub fn new(
        secret_key: impl Into<String>,
        publishable_key: impl Into<String>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            secret_key: secret_key.into(),
            publishable_key: publishable_key.into(),
            webhook_secret: webhook_secret.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(30),
            webhook_tolerance_secs: 300,
        }
    }

    /// Check key prefixes
    pub fn validate(self) -> Result<Self, RideError> {
        if !self.secret_key.starts_with("sk_test_") && !self.secret_key.starts_with("sk_live_") {
            return Err(RideError::Configuration(
                "STRIPE_SECRET_KEY must start with sk_test_ or sk_live_".to_string(),
            ));
        }
        if !self.publishable_key.starts_with("pk_test_")
            && !self.publishable_key.starts_with("pk_live_")
        {
            return Err(RideError::Configuration(
                "STRIPE_PUBLISHABLE_KEY must start with pk_test_ or pk_live_".to_string(),
            ));
        }
        if !self.webhook_secret.starts_with("whsec_") {
            return Err(RideError::Configuration(
                "STRIPE_WEBHOOK_SECRET must start with whsec_".to_string(),
            ));
        }
        if self.is_live_mode() != self.publishable_key.starts_with("pk_live_") {
            return Err(RideError::Configuration(
                "Stripe secret and publishable keys must both be test or both be live".to_string(),
            ));
        }
        Ok(self)
    }

    /// Check if using test keys
    pub fn is_test_mode(&self) -> bool {
        self.secret_key.starts_with("sk_test_")
    }

    /// Check if using live keys
    pub fn is_live_mode(&self) -> bool {
        self.secret_key.starts_with("sk_live_")
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.secret_key)
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

fn required_var(name: &str) -> Result<String, RideError> {
    env::var(name).map_err(|_| RideError::Configuration(format!("{} not set", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_detection() {
        let config = StripeConfig::new("sk_test_abc123", "pk_test_xyz789", "whsec_secret")
            .validate()
            .unwrap();
        assert!(config.is_test_mode());
        assert!(!config.is_live_mode());

        let config = StripeConfig::new("sk_live_abc123", "pk_live_xyz789", "whsec_secret")
            .validate()
            .unwrap();
        assert!(config.is_live_mode());
    }

    #[test]
    fn test_validate_rejects_bad_prefixes() {
        assert!(StripeConfig::new("rk_test_abc", "pk_test_xyz", "whsec_s")
            .validate()
            .is_err());
        assert!(StripeConfig::new("sk_test_abc", "pk_test_xyz", "secret")
            .validate()
            .is_err());
        assert!(StripeConfig::new("sk_live_abc", "pk_test_xyz", "whsec_s")
            .validate()
            .is_err());
    }

    #[test]
    fn test_auth_header() {
        let config = StripeConfig::new("sk_test_abc123", "pk_test_xyz789", "whsec_secret");
        assert_eq!(config.auth_header(), "Bearer sk_test_abc123");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config = StripeConfig::new("sk_test_a", "pk_test_b", "whsec_c")
            .with_api_base_url("http://127.0.0.1:9999/");
        assert_eq!(config.api_base_url, "http://127.0.0.1:9999");
    }
}
