use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub order_number: String,
    pub partial_allowed: bool,
    pub delivery_street: String,
    pub delivery_area: String,
    pub required_by: DateTime<Utc>,
    pub promised_delivery_at: Option<DateTime<Utc>>,
    pub predicted_delivery_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub order_state: String,
    pub delivery_state: String,
    pub subtotal: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_line_item::Entity")]
    LineItems,
    #[sea_orm(has_many = "super::order_visibility::Entity")]
    Visibilities,
}

impl Related<super::order_line_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LineItems.def()
    }
}

impl Related<super::order_visibility::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Visibilities.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
