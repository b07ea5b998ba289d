use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::error::{ApiError, ApiJson};
use crate::db::{InventoryDraft, InventoryItem, InventoryPatch, RemarkDraft};
use crate::services::inventory;
use crate::AppState;

pub async fn create_item(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    ApiJson(draft): ApiJson<InventoryDraft>,
) -> Result<(StatusCode, Json<InventoryItem>), ApiError> {
    let item = inventory::create(&state.db, &user, draft).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn list_items(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<Vec<InventoryItem>>, ApiError> {
    Ok(Json(inventory::list(&state.db).await?))
}

pub async fn get_item(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<InventoryItem>, ApiError> {
    Ok(Json(inventory::get(&state.db, &id).await?))
}

pub async fn update_item(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<InventoryPatch>,
) -> Result<Json<InventoryItem>, ApiError> {
    if patch.is_empty() {
        return Err(ApiError::bad_request("No updatable fields supplied"));
    }
    Ok(Json(inventory::update(&state.db, &user, &id, patch).await?))
}

pub async fn add_remark(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    ApiJson(remark): ApiJson<RemarkDraft>,
) -> Result<(StatusCode, Json<InventoryItem>), ApiError> {
    let item = inventory::add_remark(&state.db, &user, &id, remark).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn find_by_po_number(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
    Path(po_number): Path<String>,
) -> Result<Json<Vec<InventoryItem>>, ApiError> {
    Ok(Json(inventory::find_by_po_number(&state.db, &po_number).await?))
}

pub async fn find_by_dc_number(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
    Path(dc_number): Path<String>,
) -> Result<Json<Vec<InventoryItem>>, ApiError> {
    Ok(Json(inventory::find_by_dc_number(&state.db, &dc_number).await?))
}
