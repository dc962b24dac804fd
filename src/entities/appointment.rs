//! Appointment entity - a booked treatment session at a branch.
//!
//! `scheduled_at` is stored as an absolute UTC instant. At most one
//! non-cancelled appointment may hold a given (`branch_id`, `scheduled_at`);
//! a partial unique index backs this up at the storage level.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Freshly created
    #[sea_orm(string_value = "booked")]
    Booked,
    /// Moved to a different slot at least once
    #[sea_orm(string_value = "rescheduled")]
    Rescheduled,
    /// Session redeemed (terminal)
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Cancelled by the customer (terminal)
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl AppointmentStatus {
    /// Stable lowercase name, matching the stored value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Booked => "booked",
            Self::Rescheduled => "rescheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the appointment can still be rescheduled, cancelled or redeemed.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Booked | Self::Rescheduled)
    }
}

/// Appointment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "appointments")]
pub struct Model {
    /// Unique identifier for the appointment
    #[sea_orm(primary_key)]
    pub id: i64,
    pub customer_id: String,
    pub treatment_id: i64,
    pub branch_id: String,
    /// Slot start as an absolute instant
    pub scheduled_at: DateTimeUtc,
    pub status: AppointmentStatus,
    /// Ordered list of `{code, name, price_thb}` add-ons
    pub selected_addons: Json,
    pub addons_total_thb: f64,
    pub reschedule_count: i32,
    pub max_reschedule: i32,
    /// Policy tag the appointment was booked under
    pub cancellation_policy: String,
    /// Refund outcome recorded on cancellation
    pub refund_policy: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Appointment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One appointment has many lifecycle events
    #[sea_orm(has_many = "super::appointment_event::Entity")]
    Events,
}

impl Related<super::appointment_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
