use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{DeleteResponse, UserWriteRequest};
use super::model::User;
use super::service;
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", put(update_user).delete(delete_user))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    let users = service::list_users(state.store.as_ref()).await?;
    Ok(Json(users))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<UserWriteRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = service::create_user(
        state.store.as_ref(),
        payload.name.as_deref(),
        payload.email.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserWriteRequest>,
) -> Result<Json<User>, ApiError> {
    let user = service::update_user(
        state.store.as_ref(),
        id,
        payload.name.as_deref(),
        payload.email.as_deref(),
    )
    .await?;
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    service::delete_user(&state, id).await?;
    Ok(Json(DeleteResponse {
        success: true,
        message: "User deleted".into(),
    }))
}
