//! # Driver Types

use crate::user::VehicleDetails;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A driver profile, one per driver account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: i64,
    pub user_id: i64,
    /// Display name, joined from the owning user
    pub name: String,
    pub vehicle: VehicleDetails,
    /// Set by an admin after document checks
    pub verified: bool,
    /// Accepting new rides
    pub available: bool,
    /// Free-text location, matched by substring
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Case-folded form of a location, stored next to it for searching
pub fn fold_location(location: &str) -> String {
    location.trim().to_lowercase()
}

/// Normalize a free-text location query. Empty queries match nothing.
pub fn normalize_location_query(query: &str) -> Option<String> {
    let folded = fold_location(query);
    if folded.is_empty() {
        None
    } else {
        Some(folded)
    }
}
