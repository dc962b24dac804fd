//! Purchase and usage history, and per-bundle course summaries.
//!
//! Used sessions are counted from usage events. Ledger arithmetic
//! (bought minus remaining) is only used when the usage table does not exist,
//! which is logged.

use crate::{
    core::{catalog, is_missing_table, ledger},
    entities::{SessionBundle, Treatment, UsageEvent, session_bundle, treatment, usage_event},
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::{PaginatorTrait, QueryOrder, prelude::*};
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// One purchase in a customer's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseRecord {
    pub bundle_id: i64,
    pub sessions_bought: i32,
    pub price_thb: Option<f64>,
    pub purchased_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// One redemption in a customer's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    /// Position counted from the first use; the newest has the highest number
    pub number: usize,
    pub usage_event_id: i64,
    pub appointment_id: Option<i64>,
    pub used_at: DateTime<Utc>,
    pub provider: Option<String>,
    pub scrub: Option<String>,
    pub facial_mask: Option<String>,
    pub misting: Option<String>,
    pub extra_price_thb: Option<f64>,
    pub note: Option<String>,
}

/// Purchases and usages for one customer and treatment, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentHistory {
    pub treatment_code: String,
    pub title_th: String,
    pub title_en: String,
    pub remaining_sessions: i32,
    pub purchases: Vec<PurchaseRecord>,
    pub usages: Vec<UsageRecord>,
}

/// Lifecycle state of a purchased bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Active,
    Completed,
    Expired,
}

/// Usage summary for one purchased bundle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseSummary {
    pub bundle_id: i64,
    pub treatment_code: String,
    pub title_th: String,
    pub title_en: String,
    pub sessions_bought: i32,
    pub sessions_used: i32,
    pub sessions_remaining: i32,
    pub purchased_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: CourseStatus,
}

/// Loads purchase and usage history for a treatment.
///
/// # Errors
/// `TreatmentNotFound` for an unknown treatment code.
pub async fn history(
    db: &DatabaseConnection,
    customer_id: &str,
    treatment_code: &str,
) -> Result<TreatmentHistory> {
    let treatment = catalog::require_treatment(db, treatment_code).await?;

    let mut purchases: Vec<PurchaseRecord> = ledger::bundles_for(db, customer_id, treatment.id)
        .await?
        .into_iter()
        .map(|b| PurchaseRecord {
            bundle_id: b.id,
            sessions_bought: b.sessions_bought,
            price_thb: b.price_thb,
            purchased_at: b.purchased_at,
            expires_at: b.expires_at,
            note: b.note,
        })
        .collect();
    purchases.reverse();

    let events = match UsageEvent::find()
        .filter(usage_event::Column::CustomerId.eq(customer_id))
        .filter(usage_event::Column::TreatmentId.eq(treatment.id))
        .order_by_desc(usage_event::Column::UsedAt)
        .order_by_desc(usage_event::Column::Id)
        .all(db)
        .await
    {
        Ok(events) => events,
        Err(e) if is_missing_table(&e) => {
            warn!("Usage table missing, history has no usages: {}", e);
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    let total = events.len();
    let usages = events
        .into_iter()
        .enumerate()
        .map(|(index, e)| UsageRecord {
            number: total - index,
            usage_event_id: e.id,
            appointment_id: e.appointment_id,
            used_at: e.used_at,
            provider: e.provider,
            scrub: e.scrub,
            facial_mask: e.facial_mask,
            misting: e.misting,
            extra_price_thb: e.extra_price_thb,
            note: e.note,
        })
        .collect();

    let remaining_sessions = ledger::find_row(db, customer_id, treatment.id)
        .await?
        .map_or(0, |row| row.remaining_sessions);

    Ok(TreatmentHistory {
        treatment_code: treatment.code,
        title_th: treatment.title_th,
        title_en: treatment.title_en,
        remaining_sessions,
        purchases,
        usages,
    })
}

/// Summaries of every bundle the customer bought.
///
/// Used sessions of a treatment are allocated to its bundles soonest-expiring
/// first, ties broken by purchase time. Summaries come back in the same order.
pub async fn course_summaries(
    db: &DatabaseConnection,
    customer_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<CourseSummary>> {
    let bundles = SessionBundle::find()
        .find_also_related(Treatment)
        .filter(session_bundle::Column::CustomerId.eq(customer_id))
        .order_by_asc(session_bundle::Column::ExpiresAt)
        .order_by_asc(session_bundle::Column::PurchasedAt)
        .order_by_asc(session_bundle::Column::Id)
        .all(db)
        .await?;

    let mut by_treatment: HashMap<i64, (treatment::Model, Vec<session_bundle::Model>)> =
        HashMap::new();
    for (bundle, treatment) in bundles {
        let Some(treatment) = treatment else {
            continue;
        };
        by_treatment
            .entry(treatment.id)
            .or_insert_with(|| (treatment, Vec::new()))
            .1
            .push(bundle);
    }

    let mut summaries = Vec::new();
    for (treatment, bundles) in by_treatment.into_values() {
        let bought: i32 = bundles.iter().map(|b| b.sessions_bought).sum();
        let mut unallocated = used_sessions(db, customer_id, &treatment, bought).await?;

        for bundle in bundles {
            let used = unallocated.min(bundle.sessions_bought);
            unallocated -= used;
            let remaining = bundle.sessions_bought - used;
            let status = if bundle.expires_at < now {
                CourseStatus::Expired
            } else if remaining == 0 {
                CourseStatus::Completed
            } else {
                CourseStatus::Active
            };
            summaries.push(CourseSummary {
                bundle_id: bundle.id,
                treatment_code: treatment.code.clone(),
                title_th: treatment.title_th.clone(),
                title_en: treatment.title_en.clone(),
                sessions_bought: bundle.sessions_bought,
                sessions_used: used,
                sessions_remaining: remaining,
                purchased_at: bundle.purchased_at,
                expires_at: bundle.expires_at,
                status,
            });
        }
    }

    summaries.sort_by(|a, b| {
        a.expires_at
            .cmp(&b.expires_at)
            .then(a.purchased_at.cmp(&b.purchased_at))
            .then(a.bundle_id.cmp(&b.bundle_id))
    });
    Ok(summaries)
}

async fn used_sessions(
    db: &DatabaseConnection,
    customer_id: &str,
    treatment: &treatment::Model,
    bought: i32,
) -> Result<i32> {
    let counted = UsageEvent::find()
        .filter(usage_event::Column::CustomerId.eq(customer_id))
        .filter(usage_event::Column::TreatmentId.eq(treatment.id))
        .count(db)
        .await;

    match counted {
        Ok(count) => Ok(i32::try_from(count).unwrap_or(i32::MAX)),
        Err(e) if is_missing_table(&e) => {
            warn!(
                "Usage table missing, deriving used sessions for {} from the ledger: {}",
                treatment.code, e
            );
            let remaining = ledger::find_row(db, customer_id, treatment.id)
                .await?
                .map_or(0, |row| row.remaining_sessions);
            Ok((bought - remaining).max(0))
        }
        Err(e) => Err(e.into()),
    }
}
