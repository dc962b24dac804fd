//! Treatment entity - catalog of bookable treatments.
//!
//! Treatments are immutable reference data addressed by their business `code`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Treatment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "treatments")]
pub struct Model {
    /// Unique identifier for the treatment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique business key (e.g. "smooth")
    #[sea_orm(unique)]
    pub code: String,
    /// Thai title
    pub title_th: String,
    /// English title
    pub title_en: String,
    /// Session length in minutes
    pub duration_min: i32,
}

/// Defines relationships between Treatment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One treatment has many ledger rows
    #[sea_orm(has_many = "super::session_ledger::Entity")]
    Ledgers,
    /// One treatment has many purchase bundles
    #[sea_orm(has_many = "super::session_bundle::Entity")]
    Bundles,
}

impl Related<super::session_ledger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ledgers.def()
    }
}

impl Related<super::session_bundle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bundles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
