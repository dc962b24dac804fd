//! Blocked slot entity - staff-declared unavailable ranges per branch.
//!
//! A range covers instants in `[slot_start, slot_end)`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Blocked slot database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "branch_blocked_slots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub branch_id: String,
    /// Inclusive start of the blocked range
    pub slot_start: DateTimeUtc,
    /// Exclusive end of the blocked range
    pub slot_end: DateTimeUtc,
    pub reason: Option<String>,
}

impl Model {
    /// Whether `instant` falls inside this range.
    #[must_use]
    pub fn covers(&self, instant: DateTimeUtc) -> bool {
        self.slot_start <= instant && instant < self.slot_end
    }
}

/// Defines relationships between `BlockedSlot` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each blocked range belongs to one branch
    #[sea_orm(
        belongs_to = "super::branch::Entity",
        from = "Column::BranchId",
        to = "super::branch::Column::Id"
    )]
    Branch,
}

impl Related<super::branch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Branch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
