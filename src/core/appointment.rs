//! Appointment business logic - the booking lifecycle.
//!
//! ```text
//! create ──> booked ──reschedule──> rescheduled ──reschedule──> ...
//!              │                         │
//!              ├──cancel──> cancelled    ├──cancel──> cancelled
//!              └──redeem──> completed    └──redeem──> completed
//! ```
//!
//! Each transition runs in one transaction. The appointment row is read with
//! an exclusive lock and every UPDATE is conditional on the state that was
//! read, so two concurrent transitions cannot both apply. Redemption is the
//! only transition that touches the session ledger.

use crate::{
    config::settings::ShopSettings,
    core::{
        availability, begin_write, catalog, finish, ledger,
        redemption::{self, RedemptionDetails, RedemptionReceipt},
        slot_conflict,
    },
    entities::{
        Appointment, AppointmentEvent, AppointmentStatus, appointment, appointment_event,
        treatment,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::{
    ConnectionTrait, QueryOrder, QuerySelect, Set, prelude::*,
    sea_query::Expr,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};

/// Policy tag stamped on every new appointment.
pub const CANCELLATION_POLICY: &str = "24h_full_refund";

/// Actor recorded on events triggered by the customer.
pub const ACTOR_CUSTOMER: &str = "customer";
/// Actor recorded on events triggered by shop staff.
pub const ACTOR_STAFF: &str = "staff";

const OPEN_STATUSES: [AppointmentStatus; 2] =
    [AppointmentStatus::Booked, AppointmentStatus::Rescheduled];

/// A booking request for one shop-local slot.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub customer_id: String,
    pub treatment_code: String,
    pub branch_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    /// Topping codes, in display order
    pub addon_codes: Vec<String>,
}

/// Refund outcome of a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundPolicy {
    FullRefund,
    NoRefund,
}

impl RefundPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FullRefund => "full_refund",
            Self::NoRefund => "no_refund",
        }
    }
}

/// Result of a cancellation.
#[derive(Debug, Clone)]
pub struct CancellationOutcome {
    pub appointment: appointment::Model,
    pub refund_policy: RefundPolicy,
    /// Only computed for same-day cancellations
    pub reschedule_allowed: Option<bool>,
}

/// Decides the refund outcome for cancelling at `now`.
///
/// - at least `full_refund_window` ahead: full refund
/// - same shop-local day as `now`: no refund, reschedule offered while budget remains
/// - anything in between: no refund, reschedule not offered
#[must_use]
pub fn cancellation_policy(
    settings: &ShopSettings,
    appointment: &appointment::Model,
    now: DateTime<Utc>,
) -> (RefundPolicy, Option<bool>) {
    if appointment.scheduled_at - now >= settings.full_refund_window {
        return (RefundPolicy::FullRefund, None);
    }
    let scheduled_day = availability::shop_today(settings.timezone, appointment.scheduled_at);
    if scheduled_day == availability::shop_today(settings.timezone, now) {
        let allowed = appointment.reschedule_count < appointment.max_reschedule;
        return (RefundPolicy::NoRefund, Some(allowed));
    }
    (RefundPolicy::NoRefund, None)
}

/// Books a slot.
///
/// Timing and reference checks run before the transaction; the balance check,
/// the double-booking check and the insert run inside it.
///
/// # Errors
/// - `OffGrid`, `PastDate`, `LeadTimeNotMet`, `InvalidInput` (add-ons)
/// - `TreatmentNotFound`, `BranchNotFound`, `ToppingNotFound`
/// - `BranchUnavailable`, `SlotTaken`, `SlotBlocked`
/// - `NoRemainingSessions`
#[instrument(skip(db, settings, request), fields(customer = %request.customer_id, branch = %request.branch_id))]
pub async fn create(
    db: &DatabaseConnection,
    settings: &ShopSettings,
    request: BookingRequest,
    now: DateTime<Utc>,
) -> Result<appointment::Model> {
    let scheduled_at = availability::validate_slot_time(settings, request.date, request.time, now)?;
    let treatment = catalog::require_treatment(db, &request.treatment_code).await?;
    catalog::require_active_branch(db, &request.branch_id).await?;
    let addons = catalog::resolve_addons(db, &request.addon_codes).await?;

    let txn = begin_write(db).await?;
    let result = async {
        if !ledger::has_remaining(&txn, &request.customer_id, treatment.id).await? {
            return Err(Error::NoRemainingSessions {
                customer_id: request.customer_id.clone(),
                treatment_code: treatment.code.clone(),
            });
        }
        availability::ensure_slot_free(&txn, &request.branch_id, scheduled_at, None).await?;

        let addon_json: Vec<serde_json::Value> = addons
            .items
            .iter()
            .map(|a| json!({ "code": a.code, "name": a.name, "price_thb": a.price_thb }))
            .collect();

        let created = appointment::ActiveModel {
            customer_id: Set(request.customer_id.clone()),
            treatment_id: Set(treatment.id),
            branch_id: Set(request.branch_id.clone()),
            scheduled_at: Set(scheduled_at),
            status: Set(AppointmentStatus::Booked),
            selected_addons: Set(serde_json::Value::Array(addon_json)),
            addons_total_thb: Set(addons.total_thb),
            reschedule_count: Set(0),
            max_reschedule: Set(settings.max_reschedule),
            cancellation_policy: Set(CANCELLATION_POLICY.to_string()),
            refund_policy: Set(None),
            cancel_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| slot_conflict(e, scheduled_at))?;

        record_event(
            &txn,
            created.id,
            "created",
            ACTOR_CUSTOMER,
            json!({
                "scheduled_at": scheduled_at,
                "branch_id": created.branch_id,
                "treatment_code": treatment.code,
                "addons_total_thb": created.addons_total_thb,
            }),
            now,
        )
        .await?;
        Ok(created)
    }
    .await;

    let created = finish(txn, result).await?;
    info!(
        "Appointment {} booked for {} at {}",
        created.id, created.customer_id, created.scheduled_at
    );
    Ok(created)
}

/// Moves an open appointment to a new slot.
///
/// The terminal-state and limit checks come first, so an exhausted
/// reschedule budget is reported whatever the requested slot.
///
/// # Errors
/// - `AppointmentNotFound` (unknown id or not owned by the customer)
/// - `InvalidTransition`, `RescheduleLimitReached`
/// - `OffGrid`, `PastDate`, `LeadTimeNotMet`
/// - `BranchUnavailable`, `SlotTaken`, `SlotBlocked`
#[instrument(skip(db, settings))]
pub async fn reschedule(
    db: &DatabaseConnection,
    settings: &ShopSettings,
    appointment_id: i64,
    customer_id: &str,
    date: NaiveDate,
    time: NaiveTime,
    now: DateTime<Utc>,
) -> Result<appointment::Model> {
    let txn = begin_write(db).await?;
    let result = async {
        let current = lock_owned(&txn, appointment_id, customer_id).await?;
        ensure_open(&current, "reschedule")?;
        if current.reschedule_count >= current.max_reschedule {
            return Err(Error::RescheduleLimitReached {
                limit: current.max_reschedule,
            });
        }

        let new_at = availability::validate_slot_time(settings, date, time, now)?;
        catalog::require_active_branch(&txn, &current.branch_id).await?;
        availability::ensure_slot_free(&txn, &current.branch_id, new_at, Some(current.id)).await?;

        let updated = Appointment::update_many()
            .set(appointment::ActiveModel {
                scheduled_at: Set(new_at),
                status: Set(AppointmentStatus::Rescheduled),
                updated_at: Set(now),
                ..Default::default()
            })
            .col_expr(
                appointment::Column::RescheduleCount,
                Expr::col(appointment::Column::RescheduleCount).add(1),
            )
            .filter(appointment::Column::Id.eq(current.id))
            .filter(appointment::Column::Status.is_in(OPEN_STATUSES))
            .filter(appointment::Column::RescheduleCount.eq(current.reschedule_count))
            .exec(&txn)
            .await
            .map_err(|e| slot_conflict(e, new_at))?;
        if updated.rows_affected == 0 {
            return Err(Error::InvalidTransition {
                status: current.status.as_str().to_string(),
                action: "reschedule".to_string(),
            });
        }

        record_event(
            &txn,
            current.id,
            "rescheduled",
            ACTOR_CUSTOMER,
            json!({
                "from": current.scheduled_at,
                "to": new_at,
                "reschedule_count": current.reschedule_count + 1,
            }),
            now,
        )
        .await?;

        reload(&txn, current.id).await
    }
    .await;

    let rescheduled = finish(txn, result).await?;
    info!(
        "Appointment {} rescheduled to {} ({}/{})",
        rescheduled.id,
        rescheduled.scheduled_at,
        rescheduled.reschedule_count,
        rescheduled.max_reschedule
    );
    Ok(rescheduled)
}

/// Cancels an open appointment and records the refund outcome.
///
/// # Errors
/// `AppointmentNotFound`; `InvalidTransition` when already completed or cancelled.
#[instrument(skip(db, settings, reason))]
pub async fn cancel(
    db: &DatabaseConnection,
    settings: &ShopSettings,
    appointment_id: i64,
    customer_id: &str,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<CancellationOutcome> {
    let txn = begin_write(db).await?;
    let result = async {
        let current = lock_owned(&txn, appointment_id, customer_id).await?;
        ensure_open(&current, "cancel")?;

        let (refund_policy, reschedule_allowed) = cancellation_policy(settings, &current, now);

        let updated = Appointment::update_many()
            .set(appointment::ActiveModel {
                status: Set(AppointmentStatus::Cancelled),
                refund_policy: Set(Some(refund_policy.as_str().to_string())),
                cancel_reason: Set(reason.clone()),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(appointment::Column::Id.eq(current.id))
            .filter(appointment::Column::Status.is_in(OPEN_STATUSES))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(Error::InvalidTransition {
                status: current.status.as_str().to_string(),
                action: "cancel".to_string(),
            });
        }

        record_event(
            &txn,
            current.id,
            "cancelled",
            ACTOR_CUSTOMER,
            json!({
                "refund_policy": refund_policy.as_str(),
                "reschedule_allowed": reschedule_allowed,
                "minutes_before": (current.scheduled_at - now).num_minutes(),
                "reason": reason,
            }),
            now,
        )
        .await?;

        Ok(CancellationOutcome {
            appointment: reload(&txn, current.id).await?,
            refund_policy,
            reschedule_allowed,
        })
    }
    .await;

    let outcome = finish(txn, result).await?;
    info!(
        "Appointment {} cancelled with {}",
        outcome.appointment.id,
        outcome.refund_policy.as_str()
    );
    Ok(outcome)
}

/// Completes an open appointment and consumes one session from the ledger.
///
/// # Errors
/// `AppointmentNotFound`; `InvalidTransition` when not open;
/// `NoRemainingSessions` when the ledger is empty.
#[instrument(skip(db, details))]
pub async fn redeem(
    db: &DatabaseConnection,
    appointment_id: i64,
    details: RedemptionDetails,
    now: DateTime<Utc>,
) -> Result<RedemptionReceipt> {
    let txn = begin_write(db).await?;
    let result = async {
        let current = Appointment::find_by_id(appointment_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(Error::AppointmentNotFound { id: appointment_id })?;
        redeem_locked(&txn, &current, &details, now).await
    }
    .await;

    let receipt = finish(txn, result).await?;
    info!(
        "Appointment {} redeemed, {} sessions left",
        appointment_id, receipt.remaining_sessions
    );
    Ok(receipt)
}

/// Redemption steps for an appointment already read under lock in `conn`.
pub(crate) async fn redeem_locked<C>(
    conn: &C,
    current: &appointment::Model,
    details: &RedemptionDetails,
    now: DateTime<Utc>,
) -> Result<RedemptionReceipt>
where
    C: ConnectionTrait,
{
    ensure_open(current, "redeem")?;
    let treatment = catalog::get_treatment(conn, current.treatment_id).await?;

    let remaining = ledger::decrement_on_redeem(conn, &current.customer_id, &treatment).await?;

    let updated = Appointment::update_many()
        .set(appointment::ActiveModel {
            status: Set(AppointmentStatus::Completed),
            updated_at: Set(now),
            ..Default::default()
        })
        .filter(appointment::Column::Id.eq(current.id))
        .filter(appointment::Column::Status.is_in(OPEN_STATUSES))
        .exec(conn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(Error::InvalidTransition {
            status: current.status.as_str().to_string(),
            action: "redeem".to_string(),
        });
    }

    let usage =
        redemption::record_usage(conn, &current.customer_id, &treatment, Some(current.id), details, now)
            .await?;

    record_event(
        conn,
        current.id,
        "redeemed",
        ACTOR_STAFF,
        json!({
            "usage_event_id": usage.id,
            "remaining_sessions": remaining,
            "provider": details.provider,
        }),
        now,
    )
    .await?;

    Ok(RedemptionReceipt {
        customer_id: current.customer_id.clone(),
        treatment_code: treatment.code,
        appointment_id: Some(current.id),
        usage_event_id: usage.id,
        remaining_sessions: remaining,
        is_completed: remaining == 0,
    })
}

/// Loads an appointment owned by `customer_id`.
///
/// # Errors
/// `AppointmentNotFound` for an unknown id or another customer's appointment.
pub async fn get_owned<C>(conn: &C, appointment_id: i64, customer_id: &str) -> Result<appointment::Model>
where
    C: ConnectionTrait,
{
    Appointment::find_by_id(appointment_id)
        .one(conn)
        .await?
        .filter(|a| a.customer_id == customer_id)
        .ok_or(Error::AppointmentNotFound { id: appointment_id })
}

/// Earliest open appointment for a treatment from the start of the shop-local day.
///
/// # Errors
/// `TreatmentNotFound` for an unknown treatment code.
pub async fn next_appointment(
    db: &DatabaseConnection,
    settings: &ShopSettings,
    customer_id: &str,
    treatment_code: &str,
    now: DateTime<Utc>,
) -> Result<Option<(appointment::Model, treatment::Model)>> {
    let treatment = catalog::require_treatment(db, treatment_code).await?;
    let today = availability::shop_today(settings.timezone, now);
    let (day_start, _) = availability::day_bounds(settings.timezone, today)?;

    let next = Appointment::find()
        .filter(appointment::Column::CustomerId.eq(customer_id))
        .filter(appointment::Column::TreatmentId.eq(treatment.id))
        .filter(appointment::Column::Status.is_in(OPEN_STATUSES))
        .filter(appointment::Column::ScheduledAt.gte(day_start))
        .order_by_asc(appointment::Column::ScheduledAt)
        .one(db)
        .await?;

    Ok(next.map(|a| (a, treatment)))
}

/// Lifecycle events for an appointment, oldest first.
pub async fn events_for(
    db: &DatabaseConnection,
    appointment_id: i64,
) -> Result<Vec<appointment_event::Model>> {
    AppointmentEvent::find()
        .filter(appointment_event::Column::AppointmentId.eq(appointment_id))
        .order_by_asc(appointment_event::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn lock_owned<C>(conn: &C, appointment_id: i64, customer_id: &str) -> Result<appointment::Model>
where
    C: ConnectionTrait,
{
    Appointment::find_by_id(appointment_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .filter(|a| a.customer_id == customer_id)
        .ok_or(Error::AppointmentNotFound { id: appointment_id })
}

async fn reload<C>(conn: &C, appointment_id: i64) -> Result<appointment::Model>
where
    C: ConnectionTrait,
{
    Appointment::find_by_id(appointment_id)
        .one(conn)
        .await?
        .ok_or(Error::AppointmentNotFound { id: appointment_id })
}

fn ensure_open(appointment: &appointment::Model, action: &str) -> Result<()> {
    if appointment.status.is_open() {
        Ok(())
    } else {
        Err(Error::InvalidTransition {
            status: appointment.status.as_str().to_string(),
            action: action.to_string(),
        })
    }
}

async fn record_event<C>(
    conn: &C,
    appointment_id: i64,
    event_type: &str,
    actor: &str,
    metadata: serde_json::Value,
    now: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    appointment_event::ActiveModel {
        appointment_id: Set(appointment_id),
        event_type: Set(event_type.to_string()),
        actor: Set(actor.to_string()),
        metadata: Set(metadata),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(())
}
