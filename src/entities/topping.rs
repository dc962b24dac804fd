//! Topping entity - optional add-ons (scrub, mask, misting) chosen at booking time.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Topping database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "toppings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique business key
    #[sea_orm(unique)]
    pub code: String,
    /// `"scrub"`, `"mask"` or `"misting"`
    pub category: String,
    pub title_th: String,
    pub title_en: String,
    /// Price in THB
    pub price_thb: f64,
    pub is_active: bool,
}

impl Model {
    /// Name recorded on an appointment's add-on list.
    #[must_use]
    pub fn display_title(&self) -> &str {
        if !self.title_th.is_empty() {
            &self.title_th
        } else if !self.title_en.is_empty() {
            &self.title_en
        } else {
            &self.code
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
