//! Session ledger entity - the remaining-session counter per customer and treatment.
//!
//! There is at most one row per (`customer_id`, `treatment_id`), enforced by a
//! unique index created alongside the table. `remaining_sessions` is the
//! authoritative balance for booking eligibility and redemption.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Session ledger database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "session_ledger")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub customer_id: String,
    pub treatment_id: i64,
    /// Sessions left to redeem (never negative)
    pub remaining_sessions: i32,
    /// Time of the latest purchase
    pub purchased_at: DateTimeUtc,
    /// Expiry of the latest purchase
    pub expires_at: DateTimeUtc,
    pub note: Option<String>,
    pub is_active: bool,
}

/// Defines relationships between `SessionLedger` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each ledger row belongs to one treatment
    #[sea_orm(
        belongs_to = "super::treatment::Entity",
        from = "Column::TreatmentId",
        to = "super::treatment::Column::Id"
    )]
    Treatment,
}

impl Related<super::treatment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Treatment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
