//! Session ledger business logic - purchases and the remaining-session balance.
//!
//! Every purchase appends a bundle row and merges into the single ledger row
//! for (customer, treatment). The ledger balance only moves through atomic
//! statements so concurrent purchases and redemptions never lose an update.

use crate::{
    core::{begin_write, catalog, customer, finish},
    entities::{SessionBundle, SessionLedger, Treatment, session_bundle, session_ledger, treatment},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ConnectionTrait, QueryOrder, Set,
    prelude::*,
    sea_query::{Alias, Expr, Func, OnConflict},
};
use serde::Serialize;
use tracing::{info, instrument};

/// A purchase request for one treatment.
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub customer_id: String,
    pub display_name: Option<String>,
    pub treatment_code: String,
    pub sessions: i64,
    /// Validity in days; the shop default applies when `None`
    pub expires_days: Option<i64>,
    pub price_thb: Option<f64>,
    pub note: Option<String>,
}

/// Result of a successful purchase.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub bundle: session_bundle::Model,
    pub treatment: treatment::Model,
    /// Ledger balance after the purchase
    pub remaining_sessions: i32,
}

/// Remaining balance for one treatment, joined with the treatment's public fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceEntry {
    pub treatment_code: String,
    pub title_th: String,
    pub title_en: String,
    pub duration_min: i32,
    pub remaining_sessions: i32,
    pub purchased_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Records a purchase: a new bundle plus an increment of the ledger balance.
///
/// Repeating the same request records a second purchase.
///
/// # Errors
/// - `InvalidSessionCount` when `sessions` is not positive
/// - `InvalidInput` when `expires_days` is not positive
/// - `TreatmentNotFound` for an unknown treatment code
#[instrument(skip(db, request), fields(customer = %request.customer_id, treatment = %request.treatment_code))]
pub async fn purchase(
    db: &DatabaseConnection,
    request: PurchaseRequest,
    default_expiry_days: i64,
    now: DateTime<Utc>,
) -> Result<PurchaseReceipt> {
    let sessions = i32::try_from(request.sessions)
        .ok()
        .filter(|s| *s > 0)
        .ok_or(Error::InvalidSessionCount {
            sessions: request.sessions,
        })?;
    let expires_days = request.expires_days.unwrap_or(default_expiry_days);
    if expires_days <= 0 {
        return Err(Error::InvalidInput {
            message: format!("expires_days must be greater than 0, got {expires_days}"),
        });
    }
    if let Some(price) = request.price_thb {
        if !price.is_finite() || price < 0.0 {
            return Err(Error::InvalidInput {
                message: format!("price_thb must be a non-negative number, got {price}"),
            });
        }
    }

    let treatment = catalog::require_treatment(db, &request.treatment_code).await?;
    let expires_at = now + Duration::days(expires_days);

    let txn = begin_write(db).await?;
    let result = record_purchase(&txn, &request, &treatment, sessions, expires_at, now).await;
    let (bundle, remaining_sessions) = finish(txn, result).await?;

    info!(
        "Purchase recorded: customer={} treatment={} sessions={} remaining={}",
        request.customer_id, treatment.code, sessions, remaining_sessions
    );

    Ok(PurchaseReceipt {
        bundle,
        treatment,
        remaining_sessions,
    })
}

async fn record_purchase<C>(
    conn: &C,
    request: &PurchaseRequest,
    treatment: &treatment::Model,
    sessions: i32,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(session_bundle::Model, i32)>
where
    C: ConnectionTrait,
{
    customer::ensure_customer(conn, &request.customer_id, request.display_name.as_deref(), now)
        .await?;

    let bundle = session_bundle::ActiveModel {
        customer_id: Set(request.customer_id.clone()),
        treatment_id: Set(treatment.id),
        sessions_bought: Set(sessions),
        price_thb: Set(request.price_thb),
        purchased_at: Set(now),
        expires_at: Set(expires_at),
        note: Set(request.note.clone()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    let ledger_row = session_ledger::ActiveModel {
        customer_id: Set(request.customer_id.clone()),
        treatment_id: Set(treatment.id),
        remaining_sessions: Set(sessions),
        purchased_at: Set(now),
        expires_at: Set(expires_at),
        note: Set(request.note.clone()),
        is_active: Set(true),
        ..Default::default()
    };

    // Merge into the existing row in one statement
    let existing = Alias::new("session_ledger");
    let excluded = Alias::new("excluded");
    let on_conflict = OnConflict::columns([
        session_ledger::Column::CustomerId,
        session_ledger::Column::TreatmentId,
    ])
    .value(
        session_ledger::Column::RemainingSessions,
        Expr::col((existing.clone(), session_ledger::Column::RemainingSessions))
            .add(Expr::col((excluded.clone(), session_ledger::Column::RemainingSessions))),
    )
    .value(
        session_ledger::Column::Note,
        Func::coalesce([
            Expr::col((excluded, session_ledger::Column::Note)).into(),
            Expr::col((existing, session_ledger::Column::Note)).into(),
        ]),
    )
    .update_columns([
        session_ledger::Column::PurchasedAt,
        session_ledger::Column::ExpiresAt,
        session_ledger::Column::IsActive,
    ])
    .to_owned();

    SessionLedger::insert(ledger_row)
        .on_conflict(on_conflict)
        .exec_without_returning(conn)
        .await?;

    let balance = find_row(conn, &request.customer_id, treatment.id)
        .await?
        .map_or(0, |row| row.remaining_sessions);

    Ok((bundle, balance))
}

/// Loads the ledger row for a customer and treatment, if any.
pub async fn find_row<C>(
    conn: &C,
    customer_id: &str,
    treatment_id: i64,
) -> Result<Option<session_ledger::Model>>
where
    C: ConnectionTrait,
{
    SessionLedger::find()
        .filter(session_ledger::Column::CustomerId.eq(customer_id))
        .filter(session_ledger::Column::TreatmentId.eq(treatment_id))
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Whether the customer has an active ledger row with sessions left.
pub async fn has_remaining<C>(conn: &C, customer_id: &str, treatment_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(find_row(conn, customer_id, treatment_id)
        .await?
        .is_some_and(|row| row.is_active && row.remaining_sessions > 0))
}

/// Atomically takes one session off the balance and returns the new balance.
///
/// The decrement only applies while the row is active with a positive
/// balance, so the balance can never go negative.
///
/// # Errors
/// `NoRemainingSessions` when no row matched.
pub async fn decrement_on_redeem<C>(
    conn: &C,
    customer_id: &str,
    treatment: &treatment::Model,
) -> Result<i32>
where
    C: ConnectionTrait,
{
    let result = SessionLedger::update_many()
        .col_expr(
            session_ledger::Column::RemainingSessions,
            Expr::col(session_ledger::Column::RemainingSessions).sub(1),
        )
        .filter(session_ledger::Column::CustomerId.eq(customer_id))
        .filter(session_ledger::Column::TreatmentId.eq(treatment.id))
        .filter(session_ledger::Column::IsActive.eq(true))
        .filter(session_ledger::Column::RemainingSessions.gt(0))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::NoRemainingSessions {
            customer_id: customer_id.to_string(),
            treatment_code: treatment.code.clone(),
        });
    }

    Ok(find_row(conn, customer_id, treatment.id)
        .await?
        .map_or(0, |row| row.remaining_sessions))
}

/// Active balances with sessions left, optionally restricted to treatment codes.
///
/// An empty filter list returns nothing. Ordered by treatment code.
pub async fn query_balances(
    db: &DatabaseConnection,
    customer_id: &str,
    treatment_codes: Option<&[String]>,
) -> Result<Vec<BalanceEntry>> {
    let mut query = SessionLedger::find()
        .find_also_related(Treatment)
        .filter(session_ledger::Column::CustomerId.eq(customer_id))
        .filter(session_ledger::Column::IsActive.eq(true))
        .filter(session_ledger::Column::RemainingSessions.gt(0));
    if let Some(codes) = treatment_codes {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        query = query.filter(treatment::Column::Code.is_in(codes.iter().map(String::as_str)));
    }

    let rows = query
        .order_by_asc(treatment::Column::Code)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(row, treatment)| {
            treatment.map(|t| BalanceEntry {
                treatment_code: t.code,
                title_th: t.title_th,
                title_en: t.title_en,
                duration_min: t.duration_min,
                remaining_sessions: row.remaining_sessions,
                purchased_at: row.purchased_at,
                expires_at: row.expires_at,
                note: row.note,
            })
        })
        .collect())
}

/// Bundles bought by a customer for one treatment, oldest first.
pub async fn bundles_for<C>(
    conn: &C,
    customer_id: &str,
    treatment_id: i64,
) -> Result<Vec<session_bundle::Model>>
where
    C: ConnectionTrait,
{
    SessionBundle::find()
        .filter(session_bundle::Column::CustomerId.eq(customer_id))
        .filter(session_bundle::Column::TreatmentId.eq(treatment_id))
        .order_by_asc(session_bundle::Column::PurchasedAt)
        .order_by_asc(session_bundle::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}
