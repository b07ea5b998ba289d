use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::error::{ApiError, ApiJson, ApiQuery};
use crate::db::{PartRequest, PartRequestDraft, PartRequestView, StatusChange};
use crate::services::part_request;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

fn views(requests: Vec<PartRequest>) -> Vec<PartRequestView> {
    let now = Utc::now();
    requests
        .into_iter()
        .map(|r| PartRequestView::at(r, now))
        .collect()
}

pub async fn create_request(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    ApiJson(draft): ApiJson<PartRequestDraft>,
) -> Result<(StatusCode, Json<PartRequest>), ApiError> {
    let request = part_request::create(&state.db, &user, draft, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// All requests, or those in one status with `?status=`
pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<PartRequestView>>, ApiError> {
    let requests = match query.status.as_deref() {
        Some(raw) => {
            let status = part_request::parse_status(raw)?;
            part_request::find_by_status(&state.db, status).await?
        }
        None => part_request::list(&state.db).await?,
    };
    Ok(Json(views(requests)))
}

pub async fn list_overdue(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<Vec<PartRequestView>>, ApiError> {
    let requests = part_request::find_overdue(&state.db, Utc::now()).await?;
    Ok(Json(views(requests)))
}

pub async fn get_request(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<PartRequestView>, ApiError> {
    let request = part_request::get(&state.db, &id).await?;
    Ok(Json(PartRequestView::at(request, Utc::now())))
}

pub async fn change_status(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    ApiJson(change): ApiJson<StatusChange>,
) -> Result<Json<PartRequest>, ApiError> {
    let request = part_request::transition(&state.db, &user, &id, change, Utc::now()).await?;
    Ok(Json(request))
}
