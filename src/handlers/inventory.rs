use crate::{
    errors::ServiceError,
    services::catalog::{AddBomEntryRequest, CreateInventoryItemRequest},
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: i32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/inventory", get(list_inventory).post(create_inventory_item))
        .route(
            "/inventory/:id",
            get(get_inventory).delete(delete_inventory_item),
        )
        .route("/inventory/:id/restock", post(restock))
        .route("/bom", post(add_bom_entry))
}

pub async fn list_inventory(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let items = state.services.inventory.list_inventory().await?;
    Ok(Json(ApiResponse::success(items)))
}

pub async fn get_inventory(
    State(state): State<AppState>,
    Path(inventory_id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state
        .services
        .inventory
        .get_inventory(inventory_id)
        .await?
        .ok_or(ServiceError::InventoryItemNotFound(inventory_id))?;
    Ok(Json(ApiResponse::success(item)))
}

pub async fn restock(
    State(state): State<AppState>,
    Path(inventory_id): Path<i32>,
    Json(request): Json<RestockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state
        .services
        .inventory
        .restock(inventory_id, request.quantity)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

pub async fn create_inventory_item(
    State(state): State<AppState>,
    Json(request): Json<CreateInventoryItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.catalog.create_inventory_item(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(item))))
}

pub async fn delete_inventory_item(
    State(state): State<AppState>,
    Path(inventory_id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .catalog
        .delete_inventory_item(inventory_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_bom_entry(
    State(state): State<AppState>,
    Json(request): Json<AddBomEntryRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let entry = state.services.catalog.add_bom_entry(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(entry))))
}
