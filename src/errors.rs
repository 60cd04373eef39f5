use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::{DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use serde_json::json;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Structured details, e.g. requested vs. available stock
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Inventory item {0} not found")]
    InventoryItemNotFound(i32),

    #[error("Recipe {0} not found")]
    RecipeNotFound(i32),

    #[error("Order {0} not found")]
    OrderNotFound(i32),

    #[error("Insufficient stock for inventory item {inventory_id}: requested {requested}, available {available}")]
    InsufficientInventory {
        inventory_id: i32,
        requested: i32,
        available: i32,
    },

    #[error("Insufficient prepared stock for recipe {recipe_id}: requested {requested}, available {available}")]
    InsufficientPreparedStock {
        recipe_id: i32,
        requested: i32,
        available: i32,
    },

    #[error("Order {0} is already completed")]
    OrderAlreadyCompleted(i32),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Duplicate request: idempotency key {0} was already applied")]
    DuplicateRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Maps a write failure to a typed error when the database reports a
    /// uniqueness or foreign-key violation.
    pub fn from_write_error(err: DbErr, context: &str) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                ServiceError::Conflict(format!("{}: {}", context, detail))
            }
            Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
                ServiceError::ConstraintViolation(format!("{}: {}", context, detail))
            }
            _ => ServiceError::DatabaseError(err),
        }
    }

    /// True for lock contention the storage layer reports as retryable:
    /// SQLite busy/locked, Postgres serialization failures and deadlocks.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::DatabaseError(err) => is_transient_db_error(err),
            _ => false,
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InventoryItemNotFound(_) | Self::RecipeNotFound(_) | Self::OrderNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::InsufficientInventory { .. } | Self::InsufficientPreparedStock { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::OrderAlreadyCompleted(_)
            | Self::ConstraintViolation(_)
            | Self::Conflict(_)
            | Self::DuplicateRequest(_) => StatusCode::CONFLICT,
            Self::ValidationError(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::DatabaseError(_)
            | Self::EventError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Structured payload for stock shortfalls, so clients can show the gap.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::InsufficientInventory {
                inventory_id,
                requested,
                available,
            } => Some(json!({
                "inventory_id": inventory_id,
                "requested": requested,
                "available": available,
            })),
            Self::InsufficientPreparedStock {
                recipe_id,
                requested,
                available,
            } => Some(json!({
                "recipe_id": recipe_id,
                "requested": requested,
                "available": available,
            })),
            _ => None,
        }
    }
}

pub(crate) fn is_transient_db_error(err: &DbErr) -> bool {
    let message = err.to_string().to_ascii_lowercase();
    [
        "database is locked",
        "database table is locked",
        "sqlite_busy",
        "deadlock detected",
        "could not serialize access",
        "40001",
        "40p01",
    ]
    .iter()
    .any(|needle| message.contains(needle))
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: self.details(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn service_error_response_includes_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::OrderNotFound(9).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert_eq!(payload.message, "Order 9 not found");
    }

    #[tokio::test]
    async fn shortfall_response_carries_requested_and_available() {
        let response = ServiceError::InsufficientPreparedStock {
            recipe_id: 4,
            requested: 3,
            available: 1,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        let details = payload.details.expect("details present");
        assert_eq!(details["requested"], 3);
        assert_eq!(details["available"], 1);
    }

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::RecipeNotFound(1).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::InventoryItemNotFound(1).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::InsufficientInventory {
                inventory_id: 1,
                requested: 4,
                available: 2
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::OrderAlreadyCompleted(1).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::ConstraintViolation("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::DuplicateRequest("k".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn service_error_response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("password=hunter2".into()))
                .response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::InternalError("sensitive".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::OrderAlreadyCompleted(12).response_message(),
            "Order 12 is already completed"
        );
    }

    #[test]
    fn lock_contention_is_transient() {
        let busy = ServiceError::DatabaseError(DbErr::Custom(
            "error returned from database: (code: 5) database is locked".into(),
        ));
        assert!(busy.is_transient());

        let pg = ServiceError::DatabaseError(DbErr::Custom(
            "ERROR: could not serialize access due to concurrent update".into(),
        ));
        assert!(pg.is_transient());

        assert!(!ServiceError::RecipeNotFound(3).is_transient());
        assert!(!ServiceError::DatabaseError(DbErr::Custom("syntax error".into())).is_transient());
    }
}
