//! Route handlers, grouped by surface.

/// Appointment lifecycle endpoints
pub mod appointments;
/// Catalog and availability endpoints
pub mod catalog;
/// Session, balances, history and purchases
pub mod customer;
/// PromptPay charge endpoints
pub mod payments;

use crate::errors::{Error, Result};
use axum::Json;
use chrono::NaiveDate;
use serde_json::{Value, json};

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Returns a required, non-empty query or body field.
pub(crate) fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidInput {
            message: format!("{name} is required"),
        })
}

/// Parses a `YYYY-MM-DD` calendar date.
pub(crate) fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| Error::InvalidDate {
        value: value.to_string(),
    })
}
