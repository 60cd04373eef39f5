use crate::{
    errors::ServiceError, services::catalog::CreateRecipeRequest, ApiResponse, AppState,
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", post(create_recipe))
        .route("/recipes/:id", delete(delete_recipe))
        .route("/recipes/:id/bom", get(get_bom))
        .route("/recipes/:id/produce", post(produce_batch))
        .route("/recipes/:id/production-runs", get(list_production_runs))
        .route("/recipes/:id/prepared-stock", get(get_prepared_stock))
        .route("/prepared-stock", get(list_prepared_stock))
}

pub async fn create_recipe(
    State(state): State<AppState>,
    Json(request): Json<CreateRecipeRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let recipe = state.services.catalog.create_recipe(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(recipe))))
}

pub async fn delete_recipe(
    State(state): State<AppState>,
    Path(recipe_id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.catalog.delete_recipe(recipe_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_bom(
    State(state): State<AppState>,
    Path(recipe_id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let requirements = state.services.bom.resolve(recipe_id).await?;
    Ok(Json(ApiResponse::success(requirements)))
}

/// Cooks one batch; an `Idempotency-Key` header makes retries safe
pub async fn produce_batch(
    State(state): State<AppState>,
    Path(recipe_id): Path<i32>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .map(|v| {
            v.to_str()
                .map(str::to_string)
                .map_err(|_| ServiceError::InvalidInput("Idempotency-Key must be ASCII".into()))
        })
        .transpose()?;

    let stock = state.services.production.produce_batch(recipe_id, key).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(stock))))
}

pub async fn list_production_runs(
    State(state): State<AppState>,
    Path(recipe_id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let runs = state.services.production.list_runs(recipe_id).await?;
    Ok(Json(ApiResponse::success(runs)))
}

pub async fn get_prepared_stock(
    State(state): State<AppState>,
    Path(recipe_id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    // `data` is null until the recipe's first batch
    let stock = state.services.prepared_stock.get_by_recipe(recipe_id).await?;
    Ok(Json(ApiResponse::success(stock)))
}

pub async fn list_prepared_stock(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let stock = state.services.prepared_stock.list().await?;
    Ok(Json(ApiResponse::success(stock)))
}
