use crate::{
    db::{with_transaction, DbPool, RetryPolicy},
    entities::inventory_item::{self, Entity as InventoryItemEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Largest quantity a single restock or batch may add to a counter
pub const MAX_REPLENISH_QUANTITY: i32 = 100_000;

/// Raw-ingredient stock counts with atomic consume and replenish
#[derive(Clone)]
pub struct InventoryLedger {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    retry: RetryPolicy,
}

impl InventoryLedger {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, retry: RetryPolicy) -> Self {
        Self {
            db_pool,
            event_sender,
            retry,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_inventory(
        &self,
        inventory_id: i32,
    ) -> Result<Option<inventory_item::Model>, ServiceError> {
        Ok(InventoryItemEntity::find_by_id(inventory_id)
            .one(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn list_inventory(&self) -> Result<Vec<inventory_item::Model>, ServiceError> {
        Ok(InventoryItemEntity::find()
            .order_by_asc(inventory_item::Column::Id)
            .all(&*self.db_pool)
            .await?)
    }

    /// Takes `quantity` units out of stock, or nothing at all when fewer are available
    #[instrument(skip(self))]
    pub async fn consume(
        &self,
        inventory_id: i32,
        quantity: i32,
    ) -> Result<inventory_item::Model, ServiceError> {
        let result = with_transaction(&self.db_pool, &self.retry, move |txn| {
            Box::pin(Self::consume_in(txn, inventory_id, quantity))
        })
        .await;

        if let Err(err) = &result {
            if let Some(event) = Event::shortage_from(err) {
                counter!("pos.inventory.shortages", 1);
                self.event_sender.send_or_log(event);
            }
        }
        result
    }

    /// Adds `quantity` units to an existing item
    #[instrument(skip(self))]
    pub async fn replenish(
        &self,
        inventory_id: i32,
        quantity: i32,
    ) -> Result<inventory_item::Model, ServiceError> {
        let item = with_transaction(&self.db_pool, &self.retry, move |txn| {
            Box::pin(Self::replenish_in(txn, inventory_id, quantity))
        })
        .await?;

        info!(
            inventory_id,
            quantity,
            current_stock = item.current_stock,
            "inventory replenished"
        );
        self.event_sender.send_or_log(Event::InventoryRestocked {
            inventory_id,
            quantity,
            current_stock: item.current_stock,
        });
        Ok(item)
    }

    /// Manager restock; same effect as [`InventoryLedger::replenish`]
    pub async fn restock(
        &self,
        inventory_id: i32,
        delta: i32,
    ) -> Result<inventory_item::Model, ServiceError> {
        self.replenish(inventory_id, delta).await
    }

    /// Conditional decrement on any connection or open transaction.
    ///
    /// The stock check and the write are one `UPDATE ... WHERE current_stock >= n`
    /// statement, so concurrent consumers can never drive the count negative.
    pub async fn consume_in<C>(
        conn: &C,
        inventory_id: i32,
        quantity: i32,
    ) -> Result<inventory_item::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        if quantity < 0 {
            return Err(ServiceError::InvalidInput(format!(
                "cannot consume a negative quantity ({})",
                quantity
            )));
        }

        let updated = InventoryItemEntity::update_many()
            .col_expr(
                inventory_item::Column::CurrentStock,
                Expr::col(inventory_item::Column::CurrentStock).sub(quantity),
            )
            .col_expr(inventory_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(inventory_item::Column::Id.eq(inventory_id))
            .filter(inventory_item::Column::CurrentStock.gte(quantity))
            .exec(conn)
            .await?;

        let item = InventoryItemEntity::find_by_id(inventory_id)
            .one(conn)
            .await?
            .ok_or(ServiceError::InventoryItemNotFound(inventory_id))?;

        if updated.rows_affected == 0 {
            warn!(
                inventory_id,
                requested = quantity,
                available = item.current_stock,
                "insufficient inventory"
            );
            return Err(ServiceError::InsufficientInventory {
                inventory_id,
                requested: quantity,
                available: item.current_stock,
            });
        }

        Ok(item)
    }

    pub async fn replenish_in<C>(
        conn: &C,
        inventory_id: i32,
        quantity: i32,
    ) -> Result<inventory_item::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        if !(1..=MAX_REPLENISH_QUANTITY).contains(&quantity) {
            return Err(ServiceError::InvalidInput(format!(
                "restock quantity must be between 1 and {}, got {}",
                MAX_REPLENISH_QUANTITY, quantity
            )));
        }

        let updated = InventoryItemEntity::update_many()
            .col_expr(
                inventory_item::Column::CurrentStock,
                Expr::col(inventory_item::Column::CurrentStock).add(quantity),
            )
            .col_expr(inventory_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(inventory_item::Column::Id.eq(inventory_id))
            .filter(inventory_item::Column::CurrentStock.lte(i32::MAX - quantity))
            .exec(conn)
            .await?;

        if updated.rows_affected == 0 {
            let item = InventoryItemEntity::find_by_id(inventory_id)
                .one(conn)
                .await?
                .ok_or(ServiceError::InventoryItemNotFound(inventory_id))?;
            return Err(ServiceError::InvalidInput(format!(
                "restocking {} units would overflow stock of inventory item {} ({})",
                quantity, inventory_id, item.current_stock
            )));
        }

        InventoryItemEntity::find_by_id(inventory_id)
            .one(conn)
            .await?
            .ok_or(ServiceError::InventoryItemNotFound(inventory_id))
    }
}
