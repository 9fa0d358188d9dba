//! # Admin Statistics

use crate::money::Price;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dashboard counters for the admin panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_users: i64,
    pub total_riders: i64,
    pub total_drivers: i64,
    pub verified_drivers: i64,
    pub available_drivers: i64,
    pub total_rides: i64,
    /// Ride count per status, keyed by status name
    pub rides_by_status: BTreeMap<String, i64>,
    /// Sum of confirmed payments
    pub total_revenue: Price,
    /// Sum credited to drivers
    pub driver_payouts: Price,
    /// Revenue minus driver payouts
    pub platform_earnings: Price,
}
