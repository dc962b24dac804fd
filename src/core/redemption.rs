//! Token-driven redemption and usage recording.
//!
//! A verified token either names an appointment, which is then redeemed
//! through the appointment lifecycle, or carries no appointment reference,
//! in which case one session is consumed directly from the ledger (walk-in).
//! Either way the ledger is re-checked inside the transaction; the token
//! itself grants nothing.

use crate::{
    core::{appointment, begin_write, catalog, finish, ledger, token::TokenCodec},
    entities::{Appointment, treatment, usage_event},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, QuerySelect, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Optional service details captured at checkout.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RedemptionDetails {
    pub provider: Option<String>,
    pub scrub: Option<String>,
    pub facial_mask: Option<String>,
    pub misting: Option<String>,
    #[serde(alias = "extra_price")]
    pub extra_price_thb: Option<f64>,
    pub note: Option<String>,
}

impl RedemptionDetails {
    fn validate(&self) -> Result<()> {
        if let Some(price) = self.extra_price_thb {
            if !price.is_finite() || price < 0.0 {
                return Err(Error::InvalidInput {
                    message: format!("extra_price must be a non-negative number, got {price}"),
                });
            }
        }
        Ok(())
    }
}

/// Result of a successful redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedemptionReceipt {
    pub customer_id: String,
    pub treatment_code: String,
    /// `None` for walk-in redemptions
    pub appointment_id: Option<i64>,
    pub usage_event_id: i64,
    /// Ledger balance after this redemption
    pub remaining_sessions: i32,
    /// Whether the ledger reached zero
    pub is_completed: bool,
}

/// Appends a usage event.
pub(crate) async fn record_usage<C>(
    conn: &C,
    customer_id: &str,
    treatment: &treatment::Model,
    appointment_id: Option<i64>,
    details: &RedemptionDetails,
    now: DateTime<Utc>,
) -> Result<usage_event::Model>
where
    C: ConnectionTrait,
{
    usage_event::ActiveModel {
        customer_id: Set(customer_id.to_string()),
        treatment_id: Set(treatment.id),
        appointment_id: Set(appointment_id),
        used_at: Set(now),
        provider: Set(details.provider.clone()),
        scrub: Set(details.scrub.clone()),
        facial_mask: Set(details.facial_mask.clone()),
        misting: Set(details.misting.clone()),
        extra_price_thb: Set(details.extra_price_thb),
        note: Set(details.note.clone()),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

/// Issues a signed token for one of the customer's open appointments.
///
/// # Errors
/// `AppointmentNotFound` if not the customer's; `InvalidTransition` when the
/// appointment is completed or cancelled.
pub async fn issue_token(
    db: &DatabaseConnection,
    codec: &TokenCodec,
    appointment_id: i64,
    customer_id: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let appointment = appointment::get_owned(db, appointment_id, customer_id).await?;
    if !appointment.status.is_open() {
        return Err(Error::InvalidTransition {
            status: appointment.status.as_str().to_string(),
            action: "issue a token for".to_string(),
        });
    }
    let treatment = catalog::get_treatment(db, appointment.treatment_id).await?;
    codec.encode(customer_id, &treatment.code, Some(appointment.id), now)
}

/// Redeems a session identified by a signed token.
///
/// # Errors
/// - `MalformedToken`, `InvalidTokenSignature`, `InvalidInput`
/// - `TreatmentNotFound`, `AppointmentNotFound`
/// - `TokenMismatch` when the appointment belongs to another customer or treatment
/// - `InvalidTransition`, `NoRemainingSessions`
#[instrument(skip(db, codec, token, details))]
pub async fn redeem_by_token(
    db: &DatabaseConnection,
    codec: &TokenCodec,
    token: &str,
    details: RedemptionDetails,
    now: DateTime<Utc>,
) -> Result<RedemptionReceipt> {
    let decoded = codec.verify(token)?;
    details.validate()?;

    let Some(appointment_id) = decoded.appointment_ref else {
        return redeem_walk_in(db, &decoded.customer_id, &decoded.treatment_code, details, now)
            .await;
    };

    let treatment = catalog::require_treatment(db, &decoded.treatment_code).await?;

    let txn = begin_write(db).await?;
    let result = async {
        let current = Appointment::find_by_id(appointment_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(Error::AppointmentNotFound { id: appointment_id })?;
        if current.customer_id != decoded.customer_id || current.treatment_id != treatment.id {
            return Err(Error::TokenMismatch { appointment_id });
        }
        appointment::redeem_locked(&txn, &current, &details, now).await
    }
    .await;

    let receipt = finish(txn, result).await?;
    info!(
        "Token redemption for appointment {}: {} sessions left",
        appointment_id, receipt.remaining_sessions
    );
    Ok(receipt)
}

/// Consumes one session without an appointment.
///
/// # Errors
/// `TreatmentNotFound`, `InvalidInput`, `NoRemainingSessions`.
#[instrument(skip(db, details))]
pub async fn redeem_walk_in(
    db: &DatabaseConnection,
    customer_id: &str,
    treatment_code: &str,
    details: RedemptionDetails,
    now: DateTime<Utc>,
) -> Result<RedemptionReceipt> {
    details.validate()?;
    let treatment = catalog::require_treatment(db, treatment_code).await?;

    let txn = begin_write(db).await?;
    let result = async {
        let remaining = ledger::decrement_on_redeem(&txn, customer_id, &treatment).await?;
        let usage = record_usage(&txn, customer_id, &treatment, None, &details, now).await?;
        Ok(RedemptionReceipt {
            customer_id: customer_id.to_string(),
            treatment_code: treatment.code.clone(),
            appointment_id: None,
            usage_event_id: usage.id,
            remaining_sessions: remaining,
            is_completed: remaining == 0,
        })
    }
    .await;

    let receipt = finish(txn, result).await?;
    info!(
        "Walk-in redemption for {} ({}): {} sessions left",
        customer_id, treatment_code, receipt.remaining_sessions
    );
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::settings::ShopSettings;
    use crate::entities::{AppointmentStatus, UsageEvent};
    use crate::test_utils::*;

    fn codec() -> TokenCodec {
        TokenCodec::new("test-secret")
    }

    #[tokio::test]
    async fn test_issue_and_redeem_token() -> Result<()> {
        let db = setup_with_sessions(TEST_CUSTOMER, 1).await?;
        let booked = appointment::create(
            &db,
            &ShopSettings::default(),
            booking(TEST_CUSTOMER, "2030-03-18", "10:15"),
            test_now(),
        )
        .await?;

        let token = issue_token(&db, &codec(), booked.id, TEST_CUSTOMER, test_now()).await?;
        let receipt = redeem_by_token(&db, &codec(), &token, RedemptionDetails::default(), test_now())
            .await?;

        assert_eq!(receipt.appointment_id, Some(booked.id));
        assert_eq!(receipt.remaining_sessions, 0);
        assert!(receipt.is_completed);

        let completed = appointment::get_owned(&db, booked.id, TEST_CUSTOMER).await?;
        assert_eq!(completed.status, AppointmentStatus::Completed);

        // Token cannot be issued or used again once completed
        assert!(matches!(
            issue_token(&db, &codec(), booked.id, TEST_CUSTOMER, test_now()).await,
            Err(Error::InvalidTransition { .. })
        ));
        assert!(matches!(
            redeem_by_token(&db, &codec(), &token, RedemptionDetails::default(), test_now()).await,
            Err(Error::InvalidTransition { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_issue_token_for_other_customer_is_not_found() -> Result<()> {
        let db = setup_with_sessions(TEST_CUSTOMER, 1).await?;
        let booked = appointment::create(
            &db,
            &ShopSettings::default(),
            booking(TEST_CUSTOMER, "2030-03-18", "10:15"),
            test_now(),
        )
        .await?;

        let result = issue_token(&db, &codec(), booked.id, OTHER_CUSTOMER, test_now()).await;
        assert!(matches!(result, Err(Error::AppointmentNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_token_for_wrong_customer_is_rejected() -> Result<()> {
        let db = setup_with_sessions(TEST_CUSTOMER, 1).await?;
        let booked = appointment::create(
            &db,
            &ShopSettings::default(),
            booking(TEST_CUSTOMER, "2030-03-18", "10:15"),
            test_now(),
        )
        .await?;

        let forged = codec()
            .encode(OTHER_CUSTOMER, TEST_TREATMENT, Some(booked.id), test_now())
            .unwrap();
        let result = redeem_by_token(&db, &codec(), &forged, RedemptionDetails::default(), test_now()).await;
        assert!(matches!(result, Err(Error::TokenMismatch { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_unsigned_token_is_rejected() -> Result<()> {
        let db = setup_with_sessions(TEST_CUSTOMER, 1).await?;
        let unsigned = format!("SCGLAM|{TEST_CUSTOMER}|{TEST_TREATMENT}||1899943200");

        let result = redeem_by_token(&db, &codec(), &unsigned, RedemptionDetails::default(), test_now()).await;
        assert!(matches!(result, Err(Error::InvalidTokenSignature)));
        assert!(UsageEvent::find().all(&db).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_walk_in_token_consumes_ledger() -> Result<()> {
        let db = setup_with_sessions(TEST_CUSTOMER, 2).await?;
        let token = codec()
            .encode(TEST_CUSTOMER, TEST_TREATMENT, None, test_now())
            .unwrap();

        let details = RedemptionDetails {
            scrub: Some("coffee".to_string()),
            extra_price_thb: Some(150.0),
            ..RedemptionDetails::default()
        };
        let receipt = redeem_by_token(&db, &codec(), &token, details, test_now()).await?;
        assert_eq!(receipt.appointment_id, None);
        assert_eq!(receipt.remaining_sessions, 1);
        assert!(!receipt.is_completed);

        let usage = UsageEvent::find().all(&db).await?;
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].appointment_id, None);
        assert_eq!(usage[0].scrub.as_deref(), Some("coffee"));
        Ok(())
    }

    #[tokio::test]
    async fn test_walk_in_without_sessions_fails() -> Result<()> {
        let db = setup_seeded_db().await?;

        let result = redeem_walk_in(&db, TEST_CUSTOMER, TEST_TREATMENT, RedemptionDetails::default(), test_now()).await;
        assert!(matches!(result, Err(Error::NoRemainingSessions { .. })));
        Ok(())
    }
}
