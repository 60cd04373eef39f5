pub mod bom;
pub mod catalog;
pub mod inventory;
pub mod orders;
pub mod prepared_stock;
pub mod production;

use crate::{
    db::{DbPool, RetryPolicy},
    events::EventSender,
    notifications::OrderReadyNotifier,
};
use std::sync::Arc;

/// Every service of the fulfillment pipeline, sharing one pool and event channel
#[derive(Clone)]
pub struct PosServices {
    pub inventory: Arc<inventory::InventoryLedger>,
    pub bom: Arc<bom::BomResolver>,
    pub prepared_stock: Arc<prepared_stock::PreparedStockLedger>,
    pub production: Arc<production::ProductionEngine>,
    pub orders: Arc<orders::OrderService>,
    pub catalog: Arc<catalog::CatalogService>,
}

impl PosServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        notifier: Arc<dyn OrderReadyNotifier>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inventory: Arc::new(inventory::InventoryLedger::new(
                db_pool.clone(),
                event_sender.clone(),
                retry,
            )),
            bom: Arc::new(bom::BomResolver::new(db_pool.clone())),
            prepared_stock: Arc::new(prepared_stock::PreparedStockLedger::new(
                db_pool.clone(),
                event_sender.clone(),
                retry,
            )),
            production: Arc::new(production::ProductionEngine::new(
                db_pool.clone(),
                event_sender.clone(),
                retry,
            )),
            orders: Arc::new(orders::OrderService::new(
                db_pool.clone(),
                event_sender,
                notifier,
                retry,
            )),
            catalog: Arc::new(catalog::CatalogService::new(db_pool, retry)),
        }
    }
}
