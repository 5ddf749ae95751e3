use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::instrument;

use super::dto::{AvatarData, AvatarResponse};
use super::service::{self, AvatarUpload, MAX_AVATAR_BYTES};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/upload/avatar", post(upload_avatar).delete(delete_avatar))
        // headroom above the 5 MiB cap so near-limit files get the
        // application-level 400 instead of a transport 413
        .layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + 1024 * 1024))
}

/// POST /upload/avatar (multipart, field `avatar`)
#[instrument(skip(state, mp))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<Json<AvatarResponse>, ApiError> {
    let mut upload: Option<AvatarUpload> = None;
    loop {
        let field = mp
            .next_field()
            .await
            .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {e}")))?;
        let Some(field) = field else { break };
        if field.name() != Some("avatar") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let file_name = field.file_name().map(|s| s.to_string());
        let body = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("Failed to read upload: {e}")))?;
        upload = Some(AvatarUpload {
            body,
            content_type,
            file_name,
        });
        break;
    }
    let upload = upload.ok_or_else(|| ApiError::Validation("avatar file is required".into()))?;

    let (avatar, user) = service::upload_avatar(&state, user_id, upload).await?;
    Ok(Json(AvatarResponse {
        success: true,
        message: "Avatar uploaded".into(),
        data: AvatarData {
            avatar: Some(avatar),
            user: user.into(),
        },
    }))
}

/// DELETE /upload/avatar
#[instrument(skip(state))]
pub async fn delete_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<AvatarResponse>, ApiError> {
    let user = service::delete_avatar(&state, user_id).await?;
    Ok(Json(AvatarResponse {
        success: true,
        message: "Avatar deleted".into(),
        data: AvatarData {
            avatar: None,
            user: user.into(),
        },
    }))
}
