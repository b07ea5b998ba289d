use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::info;

use super::auth::CurrentUser;
use super::error::{ApiError, ApiJson};
use crate::db::{ProfileUpdate, User, UserResponse};
use crate::error::Error;
use crate::AppState;

pub async fn view(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Edit the caller's own profile. Keys outside the editable set are
/// rejected when the body is parsed.
pub async fn edit(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    ApiJson(mut update): ApiJson<ProfileUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    update.normalize();
    update.validate().finish().map_err(Error::from)?;

    let updated = User::update_profile(&state.db, &user.id, &update).await?;
    info!(user = %updated.id, "Profile updated");

    Ok(Json(UserResponse::from(updated)))
}
