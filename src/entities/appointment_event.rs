//! Appointment event entity - append-only audit trail of lifecycle transitions.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Appointment event database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "appointment_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub appointment_id: i64,
    /// `"created"`, `"rescheduled"`, `"cancelled"` or `"redeemed"`
    pub event_type: String,
    /// Who triggered the transition (customer id or `"staff"`)
    pub actor: String,
    /// Snapshot of the relevant appointment fields at transition time
    pub metadata: Json,
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `AppointmentEvent` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each event belongs to one appointment
    #[sea_orm(
        belongs_to = "super::appointment::Entity",
        from = "Column::AppointmentId",
        to = "super::appointment::Column::Id"
    )]
    Appointment,
}

impl Related<super::appointment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Appointment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
