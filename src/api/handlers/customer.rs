//! Session, balance, history and purchase endpoints.

use crate::{
    api::{AppState, extract::CustomerIdentity, handlers::required},
    core::{
        customer, history,
        history::{CourseSummary, TreatmentHistory},
        ledger::{self, BalanceEntry, PurchaseRequest},
    },
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub id_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub customer_id: String,
    pub display_name: Option<String>,
}

/// Verifies a LIFF ID token and registers the customer.
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionResponse>> {
    let id_token = request
        .id_token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| Error::Unauthorized {
            message: "id_token is required".to_string(),
        })?;
    let verified = state.identity.verify(id_token).await?;
    customer::ensure_customer(
        state.db.as_ref(),
        &verified.customer_id,
        verified.display_name.as_deref(),
        Utc::now(),
    )
    .await?;
    info!("Session established for {}", verified.customer_id);

    Ok(Json(SessionResponse {
        customer_id: verified.customer_id,
        display_name: verified.display_name,
    }))
}

#[derive(Debug, Serialize)]
pub struct TreatmentsResponse {
    pub customer_id: String,
    pub items: Vec<BalanceEntry>,
}

pub async fn my_treatments(
    State(state): State<AppState>,
    identity: CustomerIdentity,
) -> Result<Json<TreatmentsResponse>> {
    let items = ledger::query_balances(state.db.as_ref(), &identity.customer_id, None).await?;
    Ok(Json(TreatmentsResponse {
        customer_id: identity.customer_id,
        items,
    }))
}

#[derive(Debug, Serialize)]
pub struct CoursesResponse {
    pub courses: Vec<CourseSummary>,
}

pub async fn my_courses(
    State(state): State<AppState>,
    identity: CustomerIdentity,
) -> Result<Json<CoursesResponse>> {
    let courses = history::course_summaries(state.db.as_ref(), &identity.customer_id, Utc::now()).await?;
    Ok(Json(CoursesResponse { courses }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub treatment_code: Option<String>,
}

pub async fn my_history(
    State(state): State<AppState>,
    identity: CustomerIdentity,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<TreatmentHistory>> {
    let treatment_code = required(query.treatment_code.as_deref(), "treatment_code")?;
    let history = history::history(state.db.as_ref(), &identity.customer_id, treatment_code).await?;
    Ok(Json(history))
}

#[derive(Debug, Deserialize)]
pub struct MockBuyRequest {
    pub treatment_code: Option<String>,
    pub sessions_bought: Option<i64>,
    pub expires_days: Option<i64>,
    pub price_thb: Option<f64>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MockBuyResponse {
    pub ok: bool,
    pub bundle_id: i64,
    pub treatment_code: String,
    pub sessions_bought: i32,
    pub remaining_sessions: i32,
    pub purchased_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Records an already-paid purchase.
pub async fn mock_buy(
    State(state): State<AppState>,
    identity: CustomerIdentity,
    Json(request): Json<MockBuyRequest>,
) -> Result<(StatusCode, Json<MockBuyResponse>)> {
    let treatment_code = required(request.treatment_code.as_deref(), "treatment_code")?;
    let sessions = request.sessions_bought.ok_or_else(|| Error::InvalidInput {
        message: "sessions_bought is required".to_string(),
    })?;

    let receipt = ledger::purchase(
        state.db.as_ref(),
        PurchaseRequest {
            customer_id: identity.customer_id,
            display_name: identity.display_name,
            treatment_code: treatment_code.to_string(),
            sessions,
            expires_days: request.expires_days,
            price_thb: request.price_thb,
            note: request.note.filter(|n| !n.trim().is_empty()),
        },
        state.settings.default_expiry_days,
        Utc::now(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(MockBuyResponse {
            ok: true,
            bundle_id: receipt.bundle.id,
            treatment_code: receipt.treatment.code,
            sessions_bought: receipt.bundle.sessions_bought,
            remaining_sessions: receipt.remaining_sessions,
            purchased_at: receipt.bundle.purchased_at,
            expires_at: receipt.bundle.expires_at,
        }),
    ))
}
