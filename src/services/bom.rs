use crate::{
    db::DbPool,
    entities::{
        bom_entry::{self, Entity as BomEntryEntity},
        inventory_item::Entity as InventoryItemEntity,
        recipe::Entity as RecipeEntity,
    },
    errors::ServiceError,
};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// Raw units of one ingredient needed by one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomRequirement {
    pub inventory_id: i32,
    pub inventory_quantity: i32,
    /// Display name of the ingredient, when it could be loaded
    pub inventory_name: Option<String>,
}

/// Maps a recipe to the raw ingredients one production batch consumes
#[derive(Clone)]
pub struct BomResolver {
    db_pool: Arc<DbPool>,
}

impl BomResolver {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Requirements ordered by inventory id; empty for a recipe without ingredients
    #[instrument(skip(self))]
    pub async fn resolve(&self, recipe_id: i32) -> Result<Vec<BomRequirement>, ServiceError> {
        let db = &*self.db_pool;
        RecipeEntity::find_by_id(recipe_id)
            .one(db)
            .await?
            .ok_or(ServiceError::RecipeNotFound(recipe_id))?;

        Self::resolve_in(db, recipe_id).await
    }

    /// Resolution without the recipe existence check, for callers that
    /// already loaded the recipe inside their transaction.
    ///
    /// Ascending inventory id is the lock order every batch follows.
    pub async fn resolve_in<C>(conn: &C, recipe_id: i32) -> Result<Vec<BomRequirement>, ServiceError>
    where
        C: ConnectionTrait,
    {
        let rows = BomEntryEntity::find()
            .filter(bom_entry::Column::RecipeId.eq(recipe_id))
            .order_by_asc(bom_entry::Column::InventoryId)
            .find_also_related(InventoryItemEntity)
            .all(conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(entry, item)| BomRequirement {
                inventory_id: entry.inventory_id,
                inventory_quantity: entry.inventory_quantity,
                inventory_name: item.map(|i| i.name),
            })
            .collect())
    }
}
