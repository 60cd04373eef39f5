use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Raw ingredient tracked by the inventory ledger
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub batch_purchase_cost: Decimal,
    pub current_stock: i32,
    pub estimated_used_per_day: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::bom_entry::Entity")]
    BomEntries,
}

impl Related<super::bom_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BomEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
