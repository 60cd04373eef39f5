use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upper bound for a single meal or item quantity
pub const MAX_LINE_QUANTITY: i32 = 1_000;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tax: Decimal,
    pub total_cost: Decimal,
    pub order_time: DateTime<Utc>,
    pub cashier_id: i32,
    /// Flips false to true exactly once
    pub is_completed: bool,
    pub customer_email: Option<String>,
    #[sea_orm(column_type = "Json")]
    pub order_info: Json,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_recipe_line::Entity")]
    Lines,
}

impl Related<super::order_recipe_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Decodes the stored order payload
    pub fn info(&self) -> Result<OrderInfo, serde_json::Error> {
        serde_json::from_value(self.order_info.clone())
    }
}

fn default_quantity() -> i32 {
    1
}

/// What the customer ordered: combo meals plus à la carte items
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInfo {
    #[serde(default)]
    pub meals: Vec<MealSelection>,
    #[serde(default)]
    pub individual_items: Vec<IndividualItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealSelection {
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub selections: Selections,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selections {
    #[serde(default)]
    pub entrees: Vec<RecipeRef>,
    #[serde(default)]
    pub sides: Vec<RecipeRef>,
    #[serde(default)]
    pub drinks: Vec<RecipeRef>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeRef {
    pub recipe_id: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualItem {
    pub recipe_id: i32,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

impl Selections {
    pub fn recipe_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.entrees
            .iter()
            .chain(self.sides.iter())
            .chain(self.drinks.iter())
            .map(|r| r.recipe_id)
    }
}

impl OrderInfo {
    /// Sums quantities per recipe across all meals and individual items.
    ///
    /// Each selection in a meal counts `meal.quantity` units; a recipe that
    /// appears in several meals or as an individual item ends up as one entry.
    pub fn recipe_quantities(&self) -> BTreeMap<i32, i32> {
        let mut totals: BTreeMap<i32, i32> = BTreeMap::new();
        for meal in &self.meals {
            for recipe_id in meal.selections.recipe_ids() {
                *totals.entry(recipe_id).or_insert(0) += meal.quantity;
            }
        }
        for item in &self.individual_items {
            *totals.entry(item.recipe_id).or_insert(0) += item.quantity;
        }
        totals
    }

    pub fn is_empty(&self) -> bool {
        self.meals.iter().all(|m| m.selections.recipe_ids().next().is_none())
            && self.individual_items.is_empty()
    }

    /// Rejects negative or oversized quantities
    pub fn check_quantities(&self) -> Result<(), String> {
        let meal_quantities = self.meals.iter().map(|m| m.quantity);
        let item_quantities = self.individual_items.iter().map(|i| i.quantity);
        match meal_quantities
            .chain(item_quantities)
            .find(|q| !(0..=MAX_LINE_QUANTITY).contains(q))
        {
            Some(q) => Err(format!(
                "quantity {} is outside 0..={}",
                q, MAX_LINE_QUANTITY
            )),
            None => Ok(()),
        }
    }
}
