//! # Payment Ledger Types
//!
//! Payment and driver-earnings rows written when a ride is paid.

use crate::money::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Basis points in 100%
pub const BPS_DENOMINATOR: i64 = 10_000;

/// Default platform commission: 20%
pub const DEFAULT_COMMISSION_BPS: u32 = 2_000;

/// A confirmed payment for a ride
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub ride_id: i64,
    pub user_id: i64,
    pub amount: Price,
    /// Provider reference (Stripe PaymentIntent ID)
    pub provider_payment_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Earnings credited to a driver for one paid ride
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverEarning {
    pub id: i64,
    pub driver_id: i64,
    pub ride_id: i64,
    pub gross: Price,
    pub commission: Price,
    pub amount: Price,
    pub created_at: DateTime<Utc>,
}

/// Gross fare split between platform and driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarningsSplit {
    pub gross: i64,
    pub commission: i64,
    pub driver_amount: i64,
}

impl EarningsSplit {
    /// Split `gross` using a commission in basis points.
    /// Commission rounds down; the driver keeps the remainder.
    pub fn compute(gross: i64, commission_bps: u32) -> Self {
        let bps = i64::from(commission_bps).min(BPS_DENOMINATOR);
        let commission = gross * bps / BPS_DENOMINATOR;
        Self {
            gross,
            commission,
            driver_amount: gross - commission,
        }
    }
}

/// Earnings summary for a driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningsSummary {
    pub total: Price,
    pub rides: usize,
    pub earnings: Vec<DriverEarning>,
}
