//! Catalog and availability endpoints.

use crate::{
    api::{
        AppState,
        handlers::{parse_date, required},
    },
    core::{availability, catalog, slot_grid::format_time_of_day},
    entities::topping,
    errors::Result,
};
use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct ToppingsQuery {
    /// Only active toppings unless `active=false`
    pub active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ToppingsResponse {
    pub toppings: Vec<topping::Model>,
}

pub async fn list_toppings(
    State(state): State<AppState>,
    Query(query): Query<ToppingsQuery>,
) -> Result<Json<ToppingsResponse>> {
    let toppings = catalog::list_toppings(state.db.as_ref(), query.active.unwrap_or(true)).await?;
    Ok(Json(ToppingsResponse { toppings }))
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub branch_id: Option<String>,
    pub date: Option<String>,
    pub treatment_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    pub branch_id: String,
    pub date: String,
    pub treatment_code: String,
    /// Shop-local `HH:MM` start times
    pub slots: Vec<String>,
}

pub async fn list_slots(
    State(state): State<AppState>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>> {
    let branch_id = required(query.branch_id.as_deref(), "branch_id")?;
    let date = parse_date(required(query.date.as_deref(), "date")?)?;
    let treatment_code = required(query.treatment_code.as_deref(), "treatment_code")?;
    debug!("GET /api/slots branch={} date={}", branch_id, date);

    let slots = availability::available_slots(
        state.db.as_ref(),
        &state.settings,
        branch_id,
        date,
        treatment_code,
        Utc::now(),
    )
    .await?;

    Ok(Json(SlotsResponse {
        branch_id: branch_id.to_string(),
        date: date.to_string(),
        treatment_code: treatment_code.to_string(),
        slots: slots.into_iter().map(format_time_of_day).collect(),
    }))
}
