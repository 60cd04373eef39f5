#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use pos_api::{
    config::AppConfig,
    db,
    entities::{bom_entry, inventory_item, recipe, recipe::RecipeType},
    events::{process_events, EventSender},
    logging::discard_logger,
    notifications::{NotificationError, OrderReadyNotifier},
    services::{
        catalog::{AddBomEntryRequest, CreateInventoryItemRequest, CreateRecipeRequest},
        PosServices,
    },
    AppState,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

/// Records every notification instead of sending it
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(String, i32)>>,
}

impl RecordingNotifier {
    pub fn calls(&self) -> Vec<(String, i32)> {
        self.calls.lock().unwrap().clone()
    }

    /// Polls until `count` notifications arrived or two seconds passed
    pub async fn wait_for(&self, count: usize) -> Vec<(String, i32)> {
        for _ in 0..200 {
            let calls = self.calls();
            if calls.len() >= count {
                return calls;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.calls()
    }
}

#[async_trait]
impl OrderReadyNotifier for RecordingNotifier {
    async fn notify_order_ready(
        &self,
        email: &str,
        order_id: i32,
    ) -> Result<bool, NotificationError> {
        self.calls.lock().unwrap().push((email.to_string(), order_id));
        Ok(true)
    }
}

/// Always fails, to prove notification errors never reach callers
pub struct FailingNotifier;

#[async_trait]
impl OrderReadyNotifier for FailingNotifier {
    async fn notify_order_ready(
        &self,
        _email: &str,
        _order_id: i32,
    ) -> Result<bool, NotificationError> {
        Err(NotificationError::Internal("mail relay unavailable".into()))
    }
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    // One connection keeps the in-memory database alive for the whole test
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg.db_acquire_timeout_secs = 30;
    cfg
}

/// Several connections over one SQLite file, so transactions really overlap
pub fn file_backed_config(db_file: &std::path::Path) -> AppConfig {
    let mut cfg = test_config();
    cfg.database_url = format!("sqlite://{}?mode=rwc", db_file.display());
    cfg.db_max_connections = 8;
    cfg.db_min_connections = 1;
    // Writers queue on the file lock; conflicts that surface as SQLITE_BUSY re-run
    cfg.tx_retry_attempts = 10;
    cfg.tx_retry_backoff_ms = 5;
    cfg
}

pub async fn migrated_pool() -> Arc<db::DbPool> {
    migrated_pool_for(&test_config()).await
}

pub async fn migrated_pool_for(cfg: &AppConfig) -> Arc<db::DbPool> {
    let pool = db::establish_connection_from_app_config(cfg)
        .await
        .expect("failed to create test database");
    db::run_migrations(&pool)
        .await
        .expect("failed to run migrations in tests");
    Arc::new(pool)
}

/// Application state over a fresh, migrated in-memory SQLite database
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: Option<TempDir>,
}

impl TestApp {
    pub async fn new() -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        Self::build(test_config(), None, notifier.clone(), notifier).await
    }

    pub async fn with_notifier(notifier: Arc<dyn OrderReadyNotifier>) -> Self {
        Self::build(
            test_config(),
            None,
            notifier,
            Arc::new(RecordingNotifier::default()),
        )
        .await
    }

    /// Backed by a SQLite file in a temp dir with a multi-connection pool,
    /// for tests that need transactions to run at the same time
    pub async fn file_backed() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cfg = file_backed_config(&dir.path().join("pos_test.db"));
        let notifier = Arc::new(RecordingNotifier::default());
        Self::build(cfg, Some(dir), notifier.clone(), notifier).await
    }

    async fn build(
        cfg: AppConfig,
        db_dir: Option<TempDir>,
        notifier: Arc<dyn OrderReadyNotifier>,
        recorder: Arc<RecordingNotifier>,
    ) -> Self {
        let pool = migrated_pool_for(&cfg).await;
        let (event_sender, event_rx) = EventSender::channel(1024);
        let event_task = tokio::spawn(process_events(event_rx));

        let state = AppState::new(pool, cfg, event_sender, notifier, discard_logger());
        let router = pos_api::app_router(state.clone());

        Self {
            router,
            state,
            notifier: recorder,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    pub fn services(&self) -> &PosServices {
        &self.state.services
    }

    pub async fn seed_item(&self, name: &str, stock: i32) -> inventory_item::Model {
        self.services()
            .catalog
            .create_inventory_item(CreateInventoryItemRequest {
                name: name.to_string(),
                batch_purchase_cost: Decimal::new(1250, 2),
                current_stock: stock,
                estimated_used_per_day: 1,
            })
            .await
            .expect("seed inventory item")
    }

    pub async fn seed_recipe(&self, name: &str, orders_per_batch: i32) -> recipe::Model {
        self.services()
            .catalog
            .create_recipe(CreateRecipeRequest {
                name: name.to_string(),
                price_per_serving: Decimal::new(899, 2),
                orders_per_batch,
                recipe_type: RecipeType::Entree,
                image: None,
            })
            .await
            .expect("seed recipe")
    }

    pub async fn link(&self, item_id: i32, recipe_id: i32, quantity: i32) -> bom_entry::Model {
        self.services()
            .catalog
            .add_bom_entry(AddBomEntryRequest {
                inventory_id: item_id,
                recipe_id,
                inventory_quantity: quantity,
            })
            .await
            .expect("seed bom entry")
    }

    pub async fn stock_of(&self, item_id: i32) -> i32 {
        self.services()
            .inventory
            .get_inventory(item_id)
            .await
            .expect("load inventory")
            .expect("inventory item exists")
            .current_stock
    }

    pub async fn prepared_of(&self, recipe_id: i32) -> Option<i32> {
        self.services()
            .prepared_stock
            .get_by_recipe(recipe_id)
            .await
            .expect("load prepared stock")
            .map(|s| s.current_stock)
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
