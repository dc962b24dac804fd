//! Unified error type for the booking service.
//!
//! Every failure carries a machine-stable reason string (see [`Error::reason`])
//! and a coarse [`ErrorKind`] that the HTTP layer maps onto status codes.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

/// Coarse classification of an [`Error`], independent of transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input
    Validation,
    /// Identity credential rejected
    Unauthorized,
    /// Unknown treatment, appointment, branch or topping
    NotFound,
    /// Business rule violated (slot taken, limit reached, terminal state)
    Conflict,
    /// No remaining sessions on the ledger
    InsufficientBalance,
    /// Identity or payment provider failure
    Upstream,
    /// Storage or other unexpected failure
    Internal,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Invalid date: {value}")]
    InvalidDate { value: String },

    #[error("Invalid time: {value}")]
    InvalidTime { value: String },

    #[error("Time {time} is not on the booking grid")]
    OffGrid { time: String },

    #[error("Date {date} is in the past")]
    PastDate { date: NaiveDate },

    #[error("Slot {time} on {date} does not satisfy the {lead_minutes} minute lead time")]
    LeadTimeNotMet {
        date: NaiveDate,
        time: String,
        lead_minutes: i64,
    },

    #[error("Session count must be greater than 0, got {sessions}")]
    InvalidSessionCount { sessions: i64 },

    #[error("Malformed redemption token: {reason}")]
    MalformedToken { reason: String },

    #[error("Redemption token signature is missing or invalid")]
    InvalidTokenSignature,

    #[error("Token does not match appointment {appointment_id}")]
    TokenMismatch { appointment_id: i64 },

    #[error("Authentication failed: {message}")]
    Unauthorized { message: String },

    #[error("Treatment '{code}' not found")]
    TreatmentNotFound { code: String },

    #[error("Appointment {id} not found")]
    AppointmentNotFound { id: i64 },

    #[error("Branch '{id}' not found")]
    BranchNotFound { id: String },

    #[error("Topping '{code}' not found")]
    ToppingNotFound { code: String },

    #[error("Branch '{id}' is not accepting bookings")]
    BranchUnavailable { id: String },

    #[error("Slot at {at} is already booked")]
    SlotTaken { at: DateTime<Utc> },

    #[error("Slot at {at} is blocked by the branch")]
    SlotBlocked { at: DateTime<Utc> },

    #[error("Reschedule limit of {limit} reached")]
    RescheduleLimitReached { limit: i32 },

    #[error("Cannot {action} an appointment that is {status}")]
    InvalidTransition { status: String, action: String },

    #[error("No remaining sessions for customer '{customer_id}' and treatment '{treatment_code}'")]
    NoRemainingSessions {
        customer_id: String,
        treatment_code: String,
    },

    #[error("{service} request failed: {message}")]
    Upstream {
        service: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{service} request timed out")]
    UpstreamTimeout { service: String },
}

impl Error {
    /// Coarse classification used by the transport layer.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. }
            | Self::InvalidDate { .. }
            | Self::InvalidTime { .. }
            | Self::OffGrid { .. }
            | Self::PastDate { .. }
            | Self::LeadTimeNotMet { .. }
            | Self::InvalidSessionCount { .. }
            | Self::MalformedToken { .. }
            | Self::InvalidTokenSignature
            | Self::TokenMismatch { .. } => ErrorKind::Validation,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::TreatmentNotFound { .. }
            | Self::AppointmentNotFound { .. }
            | Self::BranchNotFound { .. }
            | Self::ToppingNotFound { .. } => ErrorKind::NotFound,
            Self::BranchUnavailable { .. }
            | Self::SlotTaken { .. }
            | Self::SlotBlocked { .. }
            | Self::RescheduleLimitReached { .. }
            | Self::InvalidTransition { .. } => ErrorKind::Conflict,
            Self::NoRemainingSessions { .. } => ErrorKind::InsufficientBalance,
            Self::Upstream { .. } | Self::UpstreamTimeout { .. } => ErrorKind::Upstream,
            Self::Config { .. } | Self::Database(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// Short, machine-stable reason string returned to callers.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Config { .. } | Self::Database(_) | Self::Io(_) => "internal_error",
            Self::InvalidInput { .. } => "invalid_input",
            Self::InvalidDate { .. } => "invalid_date",
            Self::InvalidTime { .. } => "invalid_time",
            Self::OffGrid { .. } => "slot_not_on_grid",
            Self::PastDate { .. } => "past_date",
            Self::LeadTimeNotMet { .. } => "lead_time_not_met",
            Self::InvalidSessionCount { .. } => "invalid_session_count",
            Self::MalformedToken { .. } => "malformed_token",
            Self::InvalidTokenSignature => "invalid_token_signature",
            Self::TokenMismatch { .. } => "token_mismatch",
            Self::Unauthorized { .. } => "unauthorized",
            Self::TreatmentNotFound { .. } => "treatment_not_found",
            Self::AppointmentNotFound { .. } => "appointment_not_found",
            Self::BranchNotFound { .. } => "branch_not_found",
            Self::ToppingNotFound { .. } => "topping_not_found",
            Self::BranchUnavailable { .. } => "branch_unavailable",
            Self::SlotTaken { .. } => "slot_taken",
            Self::SlotBlocked { .. } => "slot_blocked",
            Self::RescheduleLimitReached { .. } => "reschedule_limit_reached",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::NoRemainingSessions { .. } => "no_remaining_sessions",
            Self::Upstream { .. } => "upstream_error",
            Self::UpstreamTimeout { .. } => "upstream_timeout",
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_cover_business_taxonomy() {
        assert_eq!(
            Error::OffGrid {
                time: "08:10".to_string()
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            Error::TreatmentNotFound {
                code: "x".to_string()
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            Error::RescheduleLimitReached { limit: 1 }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            Error::NoRemainingSessions {
                customer_id: "U1".to_string(),
                treatment_code: "smooth".to_string()
            }
            .kind(),
            ErrorKind::InsufficientBalance
        );
        assert_eq!(
            Error::UpstreamTimeout {
                service: "line".to_string()
            }
            .kind(),
            ErrorKind::Upstream
        );
        assert_eq!(
            Error::Database(sea_orm::DbErr::Custom("boom".to_string())).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_internal_reason_hides_details() {
        let err = Error::Database(sea_orm::DbErr::Custom("secret table layout".to_string()));
        assert_eq!(err.reason(), "internal_error");
    }
}
