use crate::{
    db::{with_transaction, DbPool, RetryPolicy},
    entities::{
        prepared_stock,
        production_run::{self, Entity as ProductionRunEntity},
        recipe::Entity as RecipeEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{bom::BomResolver, inventory::InventoryLedger, prepared_stock::PreparedStockLedger},
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    error::SqlErr, sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// Turns one production run of a recipe into `orders_per_batch` servings of
/// prepared stock, consuming the recipe's BOM from raw inventory.
#[derive(Clone)]
pub struct ProductionEngine {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    retry: RetryPolicy,
}

impl ProductionEngine {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, retry: RetryPolicy) -> Self {
        Self {
            db_pool,
            event_sender,
            retry,
        }
    }

    /// Produces one batch. All ingredient decrements, the prepared-stock
    /// increment and the audit row commit together or not at all.
    ///
    /// With an idempotency key, a key that already produced a batch fails with
    /// `DuplicateRequest` and consumes nothing.
    #[instrument(skip(self))]
    pub async fn produce_batch(
        &self,
        recipe_id: i32,
        idempotency_key: Option<String>,
    ) -> Result<prepared_stock::Model, ServiceError> {
        let idempotency_key = normalize_key(idempotency_key)?;
        let key = idempotency_key.clone();

        let result = with_transaction(&self.db_pool, &self.retry, move |txn| {
            let key = key.clone();
            Box::pin(async move { Self::produce_in(txn, recipe_id, key).await })
        })
        .await;

        match result {
            Ok((stock, servings)) => {
                counter!("pos.production.batches", 1);
                info!(
                    recipe_id,
                    servings,
                    prepared_stock = stock.current_stock,
                    "batch produced"
                );
                self.event_sender.send_or_log(Event::BatchProduced {
                    recipe_id,
                    servings,
                    prepared_stock: stock.current_stock,
                    idempotency_key,
                });
                Ok(stock)
            }
            Err(err) => {
                counter!("pos.production.failures", 1);
                if let Some(event) = Event::shortage_from(&err) {
                    self.event_sender.send_or_log(event);
                }
                Err(err)
            }
        }
    }

    /// Past runs for a recipe, newest first
    #[instrument(skip(self))]
    pub async fn list_runs(
        &self,
        recipe_id: i32,
    ) -> Result<Vec<production_run::Model>, ServiceError> {
        Ok(ProductionRunEntity::find()
            .filter(production_run::Column::RecipeId.eq(recipe_id))
            .order_by_desc(production_run::Column::Id)
            .all(&*self.db_pool)
            .await?)
    }

    /// The audit row is written first: it claims the idempotency key and takes
    /// the write lock before any read, so a concurrent run waits on the lock
    /// instead of failing to upgrade a stale read.
    async fn produce_in(
        txn: &DatabaseTransaction,
        recipe_id: i32,
        idempotency_key: Option<String>,
    ) -> Result<(prepared_stock::Model, i32), ServiceError> {
        let run = production_run::ActiveModel {
            recipe_id: Set(recipe_id),
            servings_produced: Set(0),
            idempotency_key: Set(idempotency_key.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(|e| match (e.sql_err(), &idempotency_key) {
            (Some(SqlErr::UniqueConstraintViolation(_)), Some(key)) => {
                warn!(recipe_id, key = %key, "production run replayed");
                ServiceError::DuplicateRequest(key.clone())
            }
            (Some(SqlErr::ForeignKeyConstraintViolation(_)), _) => {
                ServiceError::RecipeNotFound(recipe_id)
            }
            _ => ServiceError::DatabaseError(e),
        })?;

        let recipe = RecipeEntity::find_by_id(recipe_id)
            .one(txn)
            .await?
            .ok_or(ServiceError::RecipeNotFound(recipe_id))?;

        let requirements = BomResolver::resolve_in(txn, recipe_id).await?;
        for requirement in requirements
            .iter()
            .filter(|r| r.inventory_quantity > 0)
        {
            InventoryLedger::consume_in(txn, requirement.inventory_id, requirement.inventory_quantity)
                .await?;
        }

        let stock = PreparedStockLedger::replenish_in(txn, recipe_id, recipe.orders_per_batch).await?;

        ProductionRunEntity::update_many()
            .col_expr(
                production_run::Column::ServingsProduced,
                Expr::value(recipe.orders_per_batch),
            )
            .filter(production_run::Column::Id.eq(run.id))
            .exec(txn)
            .await?;

        Ok((stock, recipe.orders_per_batch))
    }
}

fn normalize_key(key: Option<String>) -> Result<Option<String>, ServiceError> {
    match key.map(|k| k.trim().to_string()) {
        None => Ok(None),
        Some(k) if k.is_empty() => Ok(None),
        Some(k) if k.len() > MAX_IDEMPOTENCY_KEY_LEN => Err(ServiceError::ValidationError(
            format!(
                "idempotency key must be at most {} characters",
                MAX_IDEMPOTENCY_KEY_LEN
            ),
        )),
        Some(k) => Ok(Some(k)),
    }
}
