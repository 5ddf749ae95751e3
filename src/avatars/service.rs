use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use crate::users::model::User;

/// Public path prefix the avatar directory is served under. References that
/// do not resolve to a bare filename below this prefix are never deleted.
pub const PUBLIC_PREFIX: &str = "/uploads/avatars";

pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

pub struct AvatarUpload {
    pub body: Bytes,
    pub content_type: String,
    pub file_name: Option<String>,
}

/// Persists the blob, then points the user record at its public URL.
/// A replaced avatar's old blob is left behind on purpose.
pub async fn upload_avatar(
    state: &AppState,
    user_id: Uuid,
    upload: AvatarUpload,
) -> Result<(String, User), ApiError> {
    if !upload.content_type.starts_with("image/") {
        return Err(ApiError::Validation("Only image uploads are allowed".into()));
    }
    if upload.body.is_empty() {
        return Err(ApiError::Validation("Uploaded file is empty".into()));
    }
    if upload.body.len() > MAX_AVATAR_BYTES {
        return Err(ApiError::Validation("Avatar exceeds the 5 MiB limit".into()));
    }

    let ext = file_extension(upload.file_name.as_deref());
    let object = format!("avatar-{}-{}.{}", user_id, epoch_millis(), ext);

    state.storage.put_object(&object, upload.body).await?;

    let avatar_url = format!("{}{}/{}", state.config.public_base_url, PUBLIC_PREFIX, object);
    let user = state
        .store
        .set_avatar(user_id, Some(avatar_url.clone()))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(user_id = %user_id, object = %object, "avatar uploaded");
    Ok((avatar_url, user))
}

/// Clears the user's avatar reference. Blob removal is best-effort; a failed
/// delete is logged and the reference is cleared regardless.
pub async fn delete_avatar(state: &AppState, user_id: Uuid) -> Result<User, ApiError> {
    let user = state
        .store
        .get(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let Some(avatar) = user.avatar.clone() else {
        // nothing stored, nothing to do
        return Ok(user);
    };

    if let Err(e) = remove_blob(state, &avatar).await {
        warn!(error = %e, user_id = %user_id, "avatar blob delete failed; clearing reference anyway");
    }

    let user = state
        .store
        .set_avatar(user_id, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(user_id = %user_id, "avatar deleted");
    Ok(user)
}

/// Deletes the blob an avatar reference points at. References outside the
/// public prefix are ignored rather than treated as errors.
pub async fn remove_blob(state: &AppState, reference: &str) -> anyhow::Result<()> {
    let Some(object) = object_name(reference) else {
        return Ok(());
    };
    state.storage.delete_object(&object).await
}

/// Resolves a stored reference (absolute URL or path) to a storage object
/// name. Returns None unless the path is a bare filename directly under
/// `/uploads/avatars/`, which shuts the door on traversal.
fn object_name(reference: &str) -> Option<String> {
    let path = if reference.starts_with("http://") || reference.starts_with("https://") {
        let rest = reference.splitn(4, '/').nth(3)?;
        format!("/{rest}")
    } else {
        reference.to_string()
    };

    let name = path.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return None;
    }
    Some(name.to_string())
}

fn file_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "jpg".into())
}

fn epoch_millis() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use crate::storage::LocalStorage;
    use crate::users::repo::{MemoryStore, NewUser, UserStore};
    use regex::Regex;
    use std::sync::Arc;

    fn state_with_tempdir() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::from_parts(
            Arc::new(MemoryStore::default()),
            Arc::new(LocalStorage::new(dir.path())),
            Arc::new(crate::state::test_config()),
        );
        (state, dir)
    }

    async fn seed_user(state: &AppState) -> Uuid {
        state
            .store
            .insert(NewUser {
                name: "Alice".into(),
                email: "alice@example.com".into(),
            })
            .await
            .unwrap()
            .id
    }

    fn jpeg_upload() -> AvatarUpload {
        AvatarUpload {
            body: Bytes::from(vec![0xff, 0xd8, 0xff, 0xe0]),
            content_type: "image/jpeg".into(),
            file_name: Some("me.JPG".into()),
        }
    }

    #[tokio::test]
    async fn upload_sets_reference_matching_pattern() {
        let (state, dir) = state_with_tempdir();
        let id = seed_user(&state).await;

        let (avatar, user) = upload_avatar(&state, id, jpeg_upload()).await.unwrap();
        let pattern =
            Regex::new(&format!(r"^http://localhost:8080/uploads/avatars/avatar-{id}-\d+\.jpg$"))
                .unwrap();
        assert!(pattern.is_match(&avatar), "got {avatar}");
        assert_eq!(user.avatar.as_deref(), Some(avatar.as_str()));

        // the blob actually landed on disk
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn upload_rejects_non_image_mime_without_touching_user() {
        let (state, _dir) = state_with_tempdir();
        let id = seed_user(&state).await;

        let err = upload_avatar(
            &state,
            id,
            AvatarUpload {
                body: Bytes::from_static(b"%PDF-1.4"),
                content_type: "application/pdf".into(),
                file_name: Some("doc.pdf".into()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let user = state.store.get(id).await.unwrap().unwrap();
        assert!(user.avatar.is_none());
    }

    #[tokio::test]
    async fn upload_rejects_oversize_and_empty_payloads() {
        let (state, _dir) = state_with_tempdir();
        let id = seed_user(&state).await;

        let big = AvatarUpload {
            body: Bytes::from(vec![0u8; MAX_AVATAR_BYTES + 1]),
            content_type: "image/png".into(),
            file_name: Some("big.png".into()),
        };
        assert!(matches!(
            upload_avatar(&state, id, big).await.unwrap_err(),
            ApiError::Validation(_)
        ));

        let empty = AvatarUpload {
            body: Bytes::new(),
            content_type: "image/png".into(),
            file_name: None,
        };
        assert!(matches!(
            upload_avatar(&state, id, empty).await.unwrap_err(),
            ApiError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn upload_for_unknown_user_is_not_found() {
        let (state, _dir) = state_with_tempdir();
        let err = upload_avatar(&state, Uuid::new_v4(), jpeg_upload())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn upload_then_delete_roundtrip_clears_reference_and_blob() {
        let (state, dir) = state_with_tempdir();
        let id = seed_user(&state).await;

        let (_, user) = upload_avatar(&state, id, jpeg_upload()).await.unwrap();
        assert!(user.avatar.is_some());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        let user = delete_avatar(&state, id).await.unwrap();
        assert!(user.avatar.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn delete_without_avatar_is_a_noop() {
        let (state, _dir) = state_with_tempdir();
        let id = seed_user(&state).await;

        let user = delete_avatar(&state, id).await.unwrap();
        assert_eq!(user.id, id);
        assert!(user.avatar.is_none());
    }

    #[tokio::test]
    async fn delete_for_unknown_user_is_not_found() {
        let (state, _dir) = state_with_tempdir();
        let err = delete_avatar(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn object_name_resolves_absolute_urls_and_paths() {
        assert_eq!(
            object_name("http://localhost:8080/uploads/avatars/avatar-1-2.jpg").as_deref(),
            Some("avatar-1-2.jpg")
        );
        assert_eq!(
            object_name("https://cdn.example.com/uploads/avatars/x.png").as_deref(),
            Some("x.png")
        );
        assert_eq!(
            object_name("/uploads/avatars/avatar-1-2.jpg").as_deref(),
            Some("avatar-1-2.jpg")
        );
    }

    #[test]
    fn object_name_rejects_foreign_prefixes_and_traversal() {
        assert_eq!(object_name("/etc/passwd"), None);
        assert_eq!(object_name("http://x/other/avatar.jpg"), None);
        assert_eq!(object_name("/uploads/avatars/../secret.jpg"), None);
        assert_eq!(object_name("/uploads/avatars/nested/x.jpg"), None);
        assert_eq!(object_name("/uploads/avatars/"), None);
        assert_eq!(object_name("not a url"), None);
    }

    #[test]
    fn extension_defaults_and_lowercases() {
        assert_eq!(file_extension(Some("me.JPG")), "jpg");
        assert_eq!(file_extension(Some("pic.png")), "png");
        assert_eq!(file_extension(Some("archive.tar.gz")), "gz");
        assert_eq!(file_extension(Some("noext")), "jpg");
        assert_eq!(file_extension(Some("trailing.")), "jpg");
        assert_eq!(file_extension(Some("weird.e/xt")), "jpg");
        assert_eq!(file_extension(None), "jpg");
    }
}
