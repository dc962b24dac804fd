//! Usage event entity - append-only record of each completed redemption.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Usage event database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "usage_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub customer_id: String,
    pub treatment_id: i64,
    /// Appointment the session was redeemed against; `None` for walk-ins
    pub appointment_id: Option<i64>,
    pub used_at: DateTimeUtc,
    /// Staff member who performed the service
    pub provider: Option<String>,
    pub scrub: Option<String>,
    pub facial_mask: Option<String>,
    pub misting: Option<String>,
    /// Extra charge collected at checkout, in THB
    pub extra_price_thb: Option<f64>,
    pub note: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
