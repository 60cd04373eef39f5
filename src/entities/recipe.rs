use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Menu recipe; `orders_per_batch` servings come out of one production run
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "recipes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub price_per_serving: Decimal,
    pub orders_per_batch: i32,
    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub recipe_type: RecipeType,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::bom_entry::Entity")]
    BomEntries,
    #[sea_orm(has_one = "super::prepared_stock::Entity")]
    PreparedStock,
    #[sea_orm(has_many = "super::order_recipe_line::Entity")]
    OrderLines,
}

impl Related<super::bom_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BomEntries.def()
    }
}

impl Related<super::prepared_stock::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PreparedStock.def()
    }
}

impl Related<super::order_recipe_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum RecipeType {
    #[sea_orm(string_value = "Side")]
    Side,
    #[sea_orm(string_value = "Entree")]
    Entree,
    #[sea_orm(string_value = "Drink")]
    Drink,
    #[sea_orm(string_value = "Appetizer")]
    Appetizer,
}
