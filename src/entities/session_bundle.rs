//! Session bundle entity - one purchase event granting N sessions.
//!
//! Bundles are append-only; the running balance lives on the session ledger.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Session bundle database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "session_bundles")]
pub struct Model {
    /// Unique identifier for the purchase
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Customer who bought the bundle
    pub customer_id: String,
    /// Treatment the sessions are valid for
    pub treatment_id: i64,
    /// Number of sessions granted (always > 0)
    pub sessions_bought: i32,
    /// Price paid in THB, if recorded
    pub price_thb: Option<f64>,
    /// When the purchase was recorded
    pub purchased_at: DateTimeUtc,
    /// When the sessions expire
    pub expires_at: DateTimeUtc,
    /// Free-form note
    pub note: Option<String>,
}

/// Defines relationships between `SessionBundle` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each bundle belongs to one treatment
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
