use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, info, warn};

use crate::errors::ServiceError;

/// Facts published after a ledger transaction commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    OrderPlaced {
        order_id: i32,
        line_count: usize,
    },
    OrderCompleted {
        order_id: i32,
    },
    BatchProduced {
        recipe_id: i32,
        servings: i32,
        prepared_stock: i32,
        idempotency_key: Option<String>,
    },
    InventoryRestocked {
        inventory_id: i32,
        quantity: i32,
        current_stock: i32,
    },
    PreparedStockConsumed {
        recipe_id: i32,
        quantity: i32,
        remaining: i32,
    },
    StockShortage {
        resource: StockResource,
        id: i32,
        requested: i32,
        available: i32,
    },
}

/// Which counter ran short
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum StockResource {
    Inventory,
    PreparedStock,
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::OrderPlaced { .. } => "order_placed",
            Event::OrderCompleted { .. } => "order_completed",
            Event::BatchProduced { .. } => "batch_produced",
            Event::InventoryRestocked { .. } => "inventory_restocked",
            Event::PreparedStockConsumed { .. } => "prepared_stock_consumed",
            Event::StockShortage { .. } => "stock_shortage",
        }
    }

    pub fn shortage_from(err: &ServiceError) -> Option<Self> {
        match *err {
            ServiceError::InsufficientInventory {
                inventory_id,
                requested,
                available,
            } => Some(Event::StockShortage {
                resource: StockResource::Inventory,
                id: inventory_id,
                requested,
                available,
            }),
            ServiceError::InsufficientPreparedStock {
                recipe_id,
                requested,
                available,
            } => Some(Event::StockShortage {
                resource: StockResource::PreparedStock,
                id: recipe_id,
                requested,
                available,
            }),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a bounded channel and the sender wrapping it
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Publishes without waiting; fails with `EventError` when the channel
    /// is full or closed.
    pub fn try_publish(&self, event: Event) -> Result<(), ServiceError> {
        self.sender.try_send(event).map_err(|e| {
            let reason = match e {
                TrySendError::Full(_) => "event channel full",
                TrySendError::Closed(_) => "event channel closed",
            };
            ServiceError::EventError(reason.to_string())
        })
    }

    /// Like [`EventSender::try_publish`], but a dropped event is only logged
    /// so callers never block on delivery.
    pub fn send_or_log(&self, event: Event) {
        let kind = event.kind();
        if let Err(e) = self.try_publish(event) {
            warn!(event = kind, error = %e, "dropping event");
        }
    }
}

/// Drains the event channel until every sender is dropped
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::StockShortage {
                resource,
                id,
                requested,
                available,
            } => {
                warn!(
                    %resource,
                    id,
                    requested,
                    available,
                    "stock shortage"
                );
            }
            Event::PreparedStockConsumed {
                recipe_id,
                remaining,
                ..
            } if *remaining == 0 => {
                warn!(recipe_id, "prepared stock depleted");
            }
            other => match serde_json::to_string(other) {
                Ok(payload) => info!(event = %payload, "domain event"),
                Err(e) => error!("Failed to serialize event {:?}: {}", other, e),
            },
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_never_blocks_on_a_full_channel() {
        let (sender, mut rx) = EventSender::channel(1);
        sender.send_or_log(Event::OrderCompleted { order_id: 1 });
        sender.send_or_log(Event::OrderCompleted { order_id: 2 });

        assert_eq!(rx.recv().await, Some(Event::OrderCompleted { order_id: 1 }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publish_fails_once_receiver_is_gone() {
        let (sender, rx) = EventSender::channel(4);
        drop(rx);
        let err = sender
            .try_publish(Event::OrderCompleted { order_id: 3 })
            .unwrap_err();
        assert!(matches!(err, ServiceError::EventError(ref reason) if reason == "event channel closed"));
        assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn publish_reports_a_full_channel() {
        let (sender, _rx) = EventSender::channel(1);
        sender
            .try_publish(Event::OrderCompleted { order_id: 1 })
            .unwrap();
        let err = sender
            .try_publish(Event::OrderCompleted { order_id: 2 })
            .unwrap_err();
        assert!(matches!(err, ServiceError::EventError(ref reason) if reason == "event channel full"));
    }

    #[test]
    fn shortage_event_mirrors_the_error() {
        let err = ServiceError::InsufficientInventory {
            inventory_id: 8,
            requested: 4,
            available: 2,
        };
        assert_eq!(
            Event::shortage_from(&err),
            Some(Event::StockShortage {
                resource: StockResource::Inventory,
                id: 8,
                requested: 4,
                available: 2,
            })
        );
        assert_eq!(Event::shortage_from(&ServiceError::OrderNotFound(1)), None);
    }
}
