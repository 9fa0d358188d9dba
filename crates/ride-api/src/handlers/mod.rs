//! # Request Handlers
//!
//! Axum request handlers, grouped by resource.

pub mod admin;
pub mod auth;
pub mod drivers;
pub mod payments;
pub mod rides;
pub mod users;
pub mod webhook;

use axum::{response::IntoResponse, Json};
use serde::Serialize;

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "ridehail",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// List body shared by the collection endpoints
#[derive(Debug, Serialize)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub count: usize,
}

impl<T> From<Vec<T>> for Listing<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}
