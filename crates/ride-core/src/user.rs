//! # User Types
//!
//! Accounts, roles and registration validation.

use crate::error::{RideError, RideResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Books rides
    #[default]
    Rider,
    /// Has a driver profile and takes rides
    Driver,
    /// Back-office access
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Rider => "rider",
            Role::Driver => "driver",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = RideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rider" => Ok(Role::Rider),
            "driver" => Ok(Role::Driver),
            "admin" => Ok(Role::Admin),
            other => Err(RideError::InvalidRequest(format!("Unknown role: {}", other))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered user. The password hash never leaves the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_driver(&self) -> bool {
        self.role == Role::Driver
    }
}

/// Vehicle details supplied when a driver registers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleDetails {
    pub make: String,
    pub model: String,
    pub plate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
}

/// Registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub location: Option<String>,
    /// Required when `role` is `driver`
    #[serde(default)]
    pub vehicle: Option<VehicleDetails>,
}

impl RegisterRequest {
    /// Validate and normalize the request.
    ///
    /// Emails are trimmed and lowercased. Admin accounts cannot be
    /// self-registered; they are created out of band.
    pub fn validate(mut self) -> RideResult<Self> {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();

        if self.name.is_empty() {
            return Err(RideError::InvalidRequest("Name is required".to_string()));
        }
        if !is_plausible_email(&self.email) {
            return Err(RideError::InvalidRequest(format!(
                "Invalid email: {}",
                self.email
            )));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RideError::InvalidRequest(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        match self.role {
            Role::Admin => {
                return Err(RideError::Forbidden(
                    "Admin accounts cannot be self-registered".to_string(),
                ))
            }
            Role::Driver => {
                let vehicle = self.vehicle.as_ref().ok_or_else(|| {
                    RideError::InvalidRequest(
                        "Vehicle details are required for drivers".to_string(),
                    )
                })?;
                if vehicle.make.trim().is_empty()
                    || vehicle.model.trim().is_empty()
                    || vehicle.plate.trim().is_empty()
                {
                    return Err(RideError::InvalidRequest(
                        "Vehicle make, model and plate are required".to_string(),
                    ));
                }
            }
            Role::Rider => {
                self.vehicle = None;
            }
        }

        Ok(self)
    }
}

/// Profile fields a user may change
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(self) -> RideResult<Self> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(RideError::InvalidRequest("Name cannot be empty".to_string()));
            }
        }
        Ok(Self {
            name: self.name.map(|n| n.trim().to_string()),
            phone: self.phone,
        })
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}
