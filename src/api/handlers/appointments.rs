//! Appointment lifecycle endpoints.

use crate::{
    api::{
        AppState,
        extract::{CustomerIdentity, StaffIdentity},
        handlers::{parse_date, required},
    },
    core::{
        appointment::{self, BookingRequest, RefundPolicy},
        catalog::{self, SelectedAddon},
        redemption::{self, RedemptionDetails, RedemptionReceipt},
        slot_grid::{format_time_of_day, parse_time_of_day},
    },
    entities::{AppointmentStatus, appointment as appointment_entity},
    errors::Result,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Appointment as returned to clients, with the slot in shop-local time.
#[derive(Debug, Serialize)]
pub struct AppointmentView {
    pub id: i64,
    pub treatment_code: String,
    pub branch_id: String,
    /// Shop-local `YYYY-MM-DD`
    pub date: String,
    /// Shop-local `HH:MM`
    pub time: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub selected_addons: Vec<SelectedAddon>,
    pub addons_total_thb: f64,
    pub reschedule_count: i32,
    pub max_reschedule: i32,
    pub cancellation_policy: String,
    pub refund_policy: Option<String>,
    pub cancel_reason: Option<String>,
}

impl AppointmentView {
    fn new(state: &AppState, model: appointment_entity::Model, treatment_code: String) -> Self {
        let local = model.scheduled_at.with_timezone(&state.settings.timezone);
        let selected_addons =
            serde_json::from_value(model.selected_addons.clone()).unwrap_or_default();
        Self {
            id: model.id,
            treatment_code,
            branch_id: model.branch_id,
            date: local.date_naive().to_string(),
            time: format_time_of_day(local.time()),
            scheduled_at: model.scheduled_at,
            status: model.status,
            selected_addons,
            addons_total_thb: model.addons_total_thb,
            reschedule_count: model.reschedule_count,
            max_reschedule: model.max_reschedule,
            cancellation_policy: model.cancellation_policy,
            refund_policy: model.refund_policy,
            cancel_reason: model.cancel_reason,
        }
    }

    async fn load(state: &AppState, model: appointment_entity::Model) -> Result<Self> {
        let treatment = catalog::get_treatment(state.db.as_ref(), model.treatment_id).await?;
        Ok(Self::new(state, model, treatment.code))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub treatment_code: Option<String>,
    pub branch_id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    /// Topping codes
    #[serde(default)]
    pub toppings: Vec<String>,
}

pub async fn create(
    State(state): State<AppState>,
    identity: CustomerIdentity,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<AppointmentView>)> {
    let treatment_code = required(request.treatment_code.as_deref(), "treatment_code")?.to_string();
    let branch_id = required(request.branch_id.as_deref(), "branch_id")?.to_string();
    let date = parse_date(required(request.date.as_deref(), "date")?)?;
    let time = parse_time_of_day(required(request.time.as_deref(), "time")?)?;

    let booked = appointment::create(
        state.db.as_ref(),
        &state.settings,
        BookingRequest {
            customer_id: identity.customer_id,
            treatment_code: treatment_code.clone(),
            branch_id,
            date,
            time,
            addon_codes: request.toppings,
        },
        Utc::now(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(AppointmentView::new(&state, booked, treatment_code)),
    ))
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub treatment_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NextResponse {
    pub appointment: Option<AppointmentView>,
}

pub async fn next(
    State(state): State<AppState>,
    identity: CustomerIdentity,
    Query(query): Query<NextQuery>,
) -> Result<Json<NextResponse>> {
    let treatment_code = required(query.treatment_code.as_deref(), "treatment_code")?;
    let next = appointment::next_appointment(
        state.db.as_ref(),
        &state.settings,
        &identity.customer_id,
        treatment_code,
        Utc::now(),
    )
    .await?;

    Ok(Json(NextResponse {
        appointment: next.map(|(model, treatment)| AppointmentView::new(&state, model, treatment.code)),
    }))
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub appointment_id: i64,
    pub token: String,
}

pub async fn token(
    State(state): State<AppState>,
    identity: CustomerIdentity,
    Path(id): Path<i64>,
) -> Result<Json<TokenResponse>> {
    let token =
        redemption::issue_token(state.db.as_ref(), &state.codec, id, &identity.customer_id, Utc::now())
            .await?;
    Ok(Json(TokenResponse {
        appointment_id: id,
        token,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub date: Option<String>,
    pub time: Option<String>,
}

pub async fn reschedule(
    State(state): State<AppState>,
    identity: CustomerIdentity,
    Path(id): Path<i64>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<AppointmentView>> {
    let date = parse_date(required(request.date.as_deref(), "date")?)?;
    let time = parse_time_of_day(required(request.time.as_deref(), "time")?)?;

    let moved = appointment::reschedule(
        state.db.as_ref(),
        &state.settings,
        id,
        &identity.customer_id,
        date,
        time,
        Utc::now(),
    )
    .await?;
    Ok(Json(AppointmentView::load(&state, moved).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub appointment: AppointmentView,
    pub refund_policy: RefundPolicy,
    pub reschedule_allowed: Option<bool>,
}

pub async fn cancel(
    State(state): State<AppState>,
    identity: CustomerIdentity,
    Path(id): Path<i64>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<CancelResponse>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let outcome = appointment::cancel(
        state.db.as_ref(),
        &state.settings,
        id,
        &identity.customer_id,
        request.reason.filter(|r| !r.trim().is_empty()),
        Utc::now(),
    )
    .await?;

    Ok(Json(CancelResponse {
        appointment: AppointmentView::load(&state, outcome.appointment).await?,
        refund_policy: outcome.refund_policy,
        reschedule_allowed: outcome.reschedule_allowed,
    }))
}

/// Staff checkout of a booked appointment.
pub async fn redeem(
    State(state): State<AppState>,
    _staff: StaffIdentity,
    Path(id): Path<i64>,
    body: Option<Json<RedemptionDetails>>,
) -> Result<Json<RedemptionReceipt>> {
    let details = body.map(|Json(d)| d).unwrap_or_default();
    let receipt = appointment::redeem(state.db.as_ref(), id, details, Utc::now()).await?;
    Ok(Json(receipt))
}

#[derive(Debug, Deserialize)]
pub struct TokenRedeemRequest {
    pub token: Option<String>,
    #[serde(flatten)]
    pub details: RedemptionDetails,
}

/// Staff checkout by scanned token.
pub async fn redeem_by_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRedeemRequest>,
) -> Result<Json<RedemptionReceipt>> {
    let token = required(request.token.as_deref(), "token")?;
    let receipt =
        redemption::redeem_by_token(state.db.as_ref(), &state.codec, token, request.details, Utc::now())
            .await?;
    Ok(Json(receipt))
}
