use crate::{
    db::{with_transaction, DbPool, RetryPolicy},
    entities::{
        bom_entry::{self, Entity as BomEntryEntity},
        inventory_item::{self, Entity as InventoryItemEntity},
        order_recipe_line::{self, Entity as OrderRecipeLineEntity},
        prepared_stock::{self, Entity as PreparedStockEntity},
        production_run::{self, Entity as ProductionRunEntity},
        recipe::{self, Entity as RecipeEntity, RecipeType},
    },
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateInventoryItemRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(custom = "validate_non_negative")]
    pub batch_purchase_cost: Decimal,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub current_stock: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub estimated_used_per_day: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateRecipeRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(custom = "validate_non_negative")]
    pub price_per_serving: Decimal,
    /// Servings per batch, capped by the largest single replenish
    #[validate(range(min = 1, max = 100000))]
    pub orders_per_batch: i32,
    #[serde(rename = "type")]
    pub recipe_type: RecipeType,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddBomEntryRequest {
    pub inventory_id: i32,
    pub recipe_id: i32,
    #[validate(range(min = 0))]
    pub inventory_quantity: i32,
}

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("must_be_non_negative"));
    }
    Ok(())
}

/// Manager-side catalog writes: ingredients, recipes and their BOM.
/// Deletes are refused while anything still references the row.
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
    retry: RetryPolicy,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>, retry: RetryPolicy) -> Self {
        Self { db_pool, retry }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_inventory_item(
        &self,
        request: CreateInventoryItemRequest,
    ) -> Result<inventory_item::Model, ServiceError> {
        request.validate()?;
        let now = Utc::now();
        let item = inventory_item::ActiveModel {
            name: Set(request.name.trim().to_string()),
            batch_purchase_cost: Set(request.batch_purchase_cost),
            current_stock: Set(request.current_stock),
            estimated_used_per_day: Set(request.estimated_used_per_day),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| ServiceError::from_write_error(e, "inventory item name already exists"))?;

        info!(inventory_id = item.id, "inventory item created");
        Ok(item)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_recipe(
        &self,
        request: CreateRecipeRequest,
    ) -> Result<recipe::Model, ServiceError> {
        request.validate()?;
        let recipe = recipe::ActiveModel {
            name: Set(request.name.trim().to_string()),
            price_per_serving: Set(request.price_per_serving),
            orders_per_batch: Set(request.orders_per_batch),
            recipe_type: Set(request.recipe_type),
            image: Set(request.image),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| ServiceError::from_write_error(e, "recipe name already exists"))?;

        info!(recipe_id = recipe.id, "recipe created");
        Ok(recipe)
    }

    /// Links an ingredient to a recipe; each pair may appear once
    #[instrument(skip(self))]
    pub async fn add_bom_entry(
        &self,
        request: AddBomEntryRequest,
    ) -> Result<bom_entry::Model, ServiceError> {
        request.validate()?;
        with_transaction(&self.db_pool, &self.retry, move |txn| {
            let request = request.clone();
            Box::pin(async move { Self::add_bom_entry_in(txn, request).await })
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_inventory_item(&self, inventory_id: i32) -> Result<(), ServiceError> {
        with_transaction(&self.db_pool, &self.retry, move |txn| {
            Box::pin(Self::delete_inventory_item_in(txn, inventory_id))
        })
        .await?;
        info!(inventory_id, "inventory item deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_recipe(&self, recipe_id: i32) -> Result<(), ServiceError> {
        with_transaction(&self.db_pool, &self.retry, move |txn| {
            Box::pin(Self::delete_recipe_in(txn, recipe_id))
        })
        .await?;
        info!(recipe_id, "recipe deleted");
        Ok(())
    }

    async fn add_bom_entry_in(
        txn: &DatabaseTransaction,
        request: AddBomEntryRequest,
    ) -> Result<bom_entry::Model, ServiceError> {
        InventoryItemEntity::find_by_id(request.inventory_id)
            .one(txn)
            .await?
            .ok_or(ServiceError::InventoryItemNotFound(request.inventory_id))?;
        RecipeEntity::find_by_id(request.recipe_id)
            .one(txn)
            .await?
            .ok_or(ServiceError::RecipeNotFound(request.recipe_id))?;

        let existing = BomEntryEntity::find()
            .filter(bom_entry::Column::InventoryId.eq(request.inventory_id))
            .filter(bom_entry::Column::RecipeId.eq(request.recipe_id))
            .count(txn)
            .await?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "recipe {} already lists inventory item {}",
                request.recipe_id, request.inventory_id
            )));
        }

        bom_entry::ActiveModel {
            inventory_id: Set(request.inventory_id),
            recipe_id: Set(request.recipe_id),
            inventory_quantity: Set(request.inventory_quantity),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(|e| ServiceError::from_write_error(e, "bill of materials entry"))
    }

    async fn delete_inventory_item_in(
        txn: &DatabaseTransaction,
        inventory_id: i32,
    ) -> Result<(), ServiceError> {
        InventoryItemEntity::find_by_id(inventory_id)
            .one(txn)
            .await?
            .ok_or(ServiceError::InventoryItemNotFound(inventory_id))?;

        let references = BomEntryEntity::find()
            .filter(bom_entry::Column::InventoryId.eq(inventory_id))
            .count(txn)
            .await?;
        if references > 0 {
            return Err(ServiceError::ConstraintViolation(format!(
                "inventory item {} is used by {} recipe(s)",
                inventory_id, references
            )));
        }

        InventoryItemEntity::delete_by_id(inventory_id)
            .exec(txn)
            .await
            .map_err(|e| ServiceError::from_write_error(e, "inventory item is still referenced"))?;
        Ok(())
    }

    async fn delete_recipe_in(txn: &DatabaseTransaction, recipe_id: i32) -> Result<(), ServiceError> {
        RecipeEntity::find_by_id(recipe_id)
            .one(txn)
            .await?
            .ok_or(ServiceError::RecipeNotFound(recipe_id))?;

        let bom = BomEntryEntity::find()
            .filter(bom_entry::Column::RecipeId.eq(recipe_id))
            .count(txn)
            .await?;
        let prepared = PreparedStockEntity::find()
            .filter(prepared_stock::Column::RecipeId.eq(recipe_id))
            .count(txn)
            .await?;
        let ordered = OrderRecipeLineEntity::find()
            .filter(order_recipe_line::Column::RecipeId.eq(recipe_id))
            .count(txn)
            .await?;
        let runs = ProductionRunEntity::find()
            .filter(production_run::Column::RecipeId.eq(recipe_id))
            .count(txn)
            .await?;

        if bom + prepared + ordered + runs > 0 {
            return Err(ServiceError::ConstraintViolation(format!(
                "recipe {} is still referenced (bom entries: {}, prepared stock: {}, order lines: {}, production runs: {})",
                recipe_id, bom, prepared, ordered, runs
            )));
        }

        RecipeEntity::delete_by_id(recipe_id)
            .exec(txn)
            .await
            .map_err(|e| ServiceError::from_write_error(e, "recipe is still referenced"))?;
        Ok(())
    }
}
