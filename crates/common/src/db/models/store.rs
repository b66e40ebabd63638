//! Store entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// City recorded for stores created without a location
pub const UNSPECIFIED_CITY: &str = "غير محدد";

/// Shown in place of a missing or empty district
pub const UNSPECIFIED_DISTRICT: &str = "غير محدد";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stores")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text")]
    pub city: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub district: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::price_record::Entity")]
    Prices,
}

impl Related<super::price_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Prices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// True while the store still carries the placeholder city
    pub fn has_unspecified_city(&self) -> bool {
        self.city == UNSPECIFIED_CITY
    }

    /// District with empty values treated as absent
    pub fn district_name(&self) -> Option<&str> {
        self.district.as_deref().filter(|d| !d.is_empty())
    }
}
