use crate::{
    db::{with_transaction, DbPool, RetryPolicy},
    entities::{
        prepared_stock::{self, Entity as PreparedStockEntity},
        recipe::Entity as RecipeEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::inventory::MAX_REPLENISH_QUANTITY,
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    error::SqlErr,
    sea_query::{Expr, OnConflict},
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{instrument, warn};

/// Ready-to-serve servings per recipe
#[derive(Clone)]
pub struct PreparedStockLedger {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    retry: RetryPolicy,
}

impl PreparedStockLedger {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, retry: RetryPolicy) -> Self {
        Self {
            db_pool,
            event_sender,
            retry,
        }
    }

    /// `None` until the recipe's first production run
    #[instrument(skip(self))]
    pub async fn get_by_recipe(
        &self,
        recipe_id: i32,
    ) -> Result<Option<prepared_stock::Model>, ServiceError> {
        Self::find_in(&*self.db_pool, recipe_id).await
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<prepared_stock::Model>, ServiceError> {
        Ok(PreparedStockEntity::find()
            .order_by_asc(prepared_stock::Column::RecipeId)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn consume(
        &self,
        recipe_id: i32,
        quantity: i32,
    ) -> Result<prepared_stock::Model, ServiceError> {
        let result = with_transaction(&self.db_pool, &self.retry, move |txn| {
            Box::pin(Self::consume_in(txn, recipe_id, quantity))
        })
        .await;

        match &result {
            Ok(stock) => self.event_sender.send_or_log(Event::PreparedStockConsumed {
                recipe_id,
                quantity,
                remaining: stock.current_stock,
            }),
            Err(err) => {
                if let Some(event) = Event::shortage_from(err) {
                    counter!("pos.prepared_stock.shortages", 1);
                    self.event_sender.send_or_log(event);
                }
            }
        }
        result
    }

    #[instrument(skip(self))]
    pub async fn replenish(
        &self,
        recipe_id: i32,
        quantity: i32,
    ) -> Result<prepared_stock::Model, ServiceError> {
        with_transaction(&self.db_pool, &self.retry, move |txn| {
            Box::pin(Self::replenish_in(txn, recipe_id, quantity))
        })
        .await
    }

    pub async fn find_in<C>(
        conn: &C,
        recipe_id: i32,
    ) -> Result<Option<prepared_stock::Model>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(PreparedStockEntity::find()
            .filter(prepared_stock::Column::RecipeId.eq(recipe_id))
            .one(conn)
            .await?)
    }

    /// Conditional decrement keyed by recipe. A recipe that was never
    /// produced has zero servings available.
    pub async fn consume_in<C>(
        conn: &C,
        recipe_id: i32,
        quantity: i32,
    ) -> Result<prepared_stock::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(format!(
                "prepared stock quantity must be positive, got {}",
                quantity
            )));
        }

        let updated = PreparedStockEntity::update_many()
            .col_expr(
                prepared_stock::Column::CurrentStock,
                Expr::col(prepared_stock::Column::CurrentStock).sub(quantity),
            )
            .col_expr(prepared_stock::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(prepared_stock::Column::RecipeId.eq(recipe_id))
            .filter(prepared_stock::Column::CurrentStock.gte(quantity))
            .exec(conn)
            .await?;

        let current = Self::find_in(conn, recipe_id).await?;

        if updated.rows_affected == 0 {
            let available = match &current {
                Some(stock) => stock.current_stock,
                None => {
                    RecipeEntity::find_by_id(recipe_id)
                        .one(conn)
                        .await?
                        .ok_or(ServiceError::RecipeNotFound(recipe_id))?;
                    0
                }
            };
            warn!(
                recipe_id,
                requested = quantity,
                available,
                "insufficient prepared stock"
            );
            return Err(ServiceError::InsufficientPreparedStock {
                recipe_id,
                requested: quantity,
                available,
            });
        }

        current.ok_or_else(|| {
            ServiceError::InternalError(format!("prepared stock for recipe {} vanished", recipe_id))
        })
    }

    /// Adds servings, creating the recipe's row on its first batch.
    ///
    /// Single upsert statement, so two first batches racing on the same
    /// recipe cannot create two rows or lose an increment.
    pub async fn replenish_in<C>(
        conn: &C,
        recipe_id: i32,
        quantity: i32,
    ) -> Result<prepared_stock::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        if !(1..=MAX_REPLENISH_QUANTITY).contains(&quantity) {
            return Err(ServiceError::InvalidInput(format!(
                "prepared stock quantity must be between 1 and {}, got {}",
                MAX_REPLENISH_QUANTITY, quantity
            )));
        }

        let now = Utc::now();
        let row = prepared_stock::ActiveModel {
            recipe_id: Set(recipe_id),
            current_stock: Set(quantity),
            updated_at: Set(now),
            ..Default::default()
        };

        PreparedStockEntity::insert(row)
            .on_conflict(
                OnConflict::column(prepared_stock::Column::RecipeId)
                    .value(
                        prepared_stock::Column::CurrentStock,
                        Expr::col((PreparedStockEntity, prepared_stock::Column::CurrentStock))
                            .add(quantity),
                    )
                    .value(prepared_stock::Column::UpdatedAt, Expr::value(now))
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                    ServiceError::RecipeNotFound(recipe_id)
                }
                _ => ServiceError::DatabaseError(e),
            })?;

        Self::find_in(conn, recipe_id)
            .await?
            .ok_or(ServiceError::RecipeNotFound(recipe_id))
    }
}
