//! # Fare Estimation
//!
//! Fares are a placeholder: a uniform draw between configured bounds.
//! The estimator sits behind a trait so tests can pin the amount.
//!
//! Bounds are loaded from `config/fares.toml`:
//!
//! ```toml
//! currency = "usd"
//! min_fare = 5.00
//! max_fare = 50.00
//! ```

use crate::error::{RideError, RideResult};
use crate::money::{Currency, Price};
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;

/// Fare bounds in major units
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FareConfig {
    #[serde(default)]
    pub currency: Currency,
    #[serde(default = "default_min_fare")]
    pub min_fare: f64,
    #[serde(default = "default_max_fare")]
    pub max_fare: f64,
}

fn default_min_fare() -> f64 {
    5.0
}

fn default_max_fare() -> f64 {
    50.0
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            currency: Currency::USD,
            min_fare: default_min_fare(),
            max_fare: default_max_fare(),
        }
    }
}

impl FareConfig {
    /// Parse from TOML and check the bounds
    pub fn from_toml(content: &str) -> RideResult<Self> {
        let config: FareConfig = toml::from_str(content)
            .map_err(|e| RideError::Configuration(format!("Invalid fare config: {}", e)))?;
        config.validate()
    }

    pub fn validate(self) -> RideResult<Self> {
        let ordered = self.min_fare.is_finite()
            && self.max_fare.is_finite()
            && self.min_fare > 0.0
            && self.max_fare >= self.min_fare;

        if !ordered {
            return Err(RideError::Configuration(format!(
                "Fare bounds must be finite and satisfy 0 < min_fare <= max_fare (got {} and {})",
                self.min_fare, self.max_fare
            )));
        }

        if self.min_price().amount < 1 {
            return Err(RideError::Configuration(format!(
                "min_fare {} is below the smallest {} unit",
                self.min_fare, self.currency
            )));
        }
        Ok(self)
    }

    /// Switch currency, keeping the bounds as major units
    pub fn with_currency(self, currency: Currency) -> RideResult<Self> {
        Self { currency, ..self }.validate()
    }

    pub fn min_price(&self) -> Price {
        Price::new(self.min_fare, self.currency)
    }

    pub fn max_price(&self) -> Price {
        Price::new(self.max_fare, self.currency)
    }
}

/// Computes the fare for a trip
pub trait FareEstimator: Send + Sync {
    fn estimate(&self, pickup: &str, dropoff: &str) -> Price;
}

/// Type alias for a shared estimator (dynamic dispatch)
pub type SharedFareEstimator = Arc<dyn FareEstimator>;

/// Uniformly random fare between the configured bounds
#[derive(Debug, Clone)]
pub struct RandomFareEstimator {
    config: FareConfig,
}

impl RandomFareEstimator {
    pub fn new(config: FareConfig) -> Self {
        Self { config }
    }
}

impl FareEstimator for RandomFareEstimator {
    fn estimate(&self, _pickup: &str, _dropoff: &str) -> Price {
        let min = self.config.min_price().amount;
        let max = self.config.max_price().amount;
        let amount = rand::thread_rng().gen_range(min..=max);
        Price::from_cents(amount, self.config.currency)
    }
}

/// Always returns the same fare
#[derive(Debug, Clone, Copy)]
pub struct FixedFareEstimator(pub Price);

impl FareEstimator for FixedFareEstimator {
    fn estimate(&self, _pickup: &str, _dropoff: &str) -> Price {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_fare_within_bounds() {
        let estimator = RandomFareEstimator::new(FareConfig {
            currency: Currency::USD,
            min_fare: 7.5,
            max_fare: 9.0,
        });
        for _ in 0..200 {
            let fare = estimator.estimate("a", "b");
            assert!((750..=900).contains(&fare.amount));
            assert_eq!(fare.currency, Currency::USD);
        }
    }

    #[test]
    fn test_fare_config_from_toml() {
        let config = FareConfig::from_toml("currency = \"eur\"\nmin_fare = 3.0\nmax_fare = 30.0\n").unwrap();
        assert_eq!(config.currency, Currency::EUR);
        assert_eq!(config.min_price().amount, 300);

        let defaults = FareConfig::from_toml("").unwrap();
        assert_eq!(defaults, FareConfig::default());
    }

    #[test]
    fn test_fare_config_rejects_inverted_bounds() {
        assert!(FareConfig::from_toml("min_fare = 10.0\nmax_fare = 2.0\n").is_err());
        assert!(FareConfig::from_toml("min_fare = 0.0\n").is_err());
    }

    #[test]
    fn test_fare_config_rejects_non_finite_bounds() {
        assert!(FareConfig::from_toml("min_fare = 5.0\nmax_fare = nan\n").is_err());
        assert!(FareConfig::from_toml("min_fare = nan\nmax_fare = 5.0\n").is_err());
        assert!(FareConfig::from_toml("min_fare = 5.0\nmax_fare = inf\n").is_err());
    }

    #[test]
    fn test_fare_config_rejects_sub_unit_fares() {
        assert!(FareConfig::from_toml("min_fare = 0.001\nmax_fare = 0.004\n").is_err());
        let one_cent = FareConfig::from_toml("min_fare = 0.01\nmax_fare = 0.01\n").unwrap();
        assert_eq!(RandomFareEstimator::new(one_cent).estimate("a", "b").amount, 1);
    }

    #[test]
    fn test_currency_switch_revalidates() {
        let yen = FareConfig::default().with_currency(Currency::JPY).unwrap();
        assert_eq!(yen.min_price().amount, 5);

        let cents = FareConfig::from_toml("min_fare = 0.4\nmax_fare = 0.9\n").unwrap();
        assert!(cents.with_currency(Currency::JPY).is_err());
    }

    #[test]
    fn test_fixed_fare() {
        let fixed = FixedFareEstimator(Price::from_cents(1234, Currency::USD));
        assert_eq!(fixed.estimate("x", "y").amount, 1234);
    }
}
