//! Branch entity - physical shop locations that take bookings.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Branch database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "branches")]
pub struct Model {
    /// Branch identifier (e.g. "branch-003")
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Human-readable label
    pub label: String,
    /// Inactive branches are listed but cannot be booked
    pub is_active: bool,
}

/// Defines relationships between Branch and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One branch has many blocked ranges
    #[sea_orm(has_many = "super::blocked_slot::Entity")]
    BlockedSlots,
}

impl Related<super::blocked_slot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BlockedSlots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
