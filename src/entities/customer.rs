//! Customer entity - one row per messaging-platform user.
//!
//! The primary key is the stable identifier returned by the identity provider.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Customer database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    /// Messaging-platform user id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name reported by the identity provider, if known
    pub display_name: Option<String>,
    /// When the customer was first seen
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
