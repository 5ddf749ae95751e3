use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::model::User;
use super::repo::{NewUser, UserPatch, UserStore};
use crate::avatars;
use crate::error::ApiError;
use crate::state::AppState;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trims both fields and rejects missing, empty, or malformed input.
/// Emails are compared case-sensitively throughout, so no case folding here.
fn validate(name: Option<&str>, email: Option<&str>) -> Result<(String, String), ApiError> {
    let name = name.map(str::trim).filter(|s| !s.is_empty());
    let email = email.map(str::trim).filter(|s| !s.is_empty());
    let (name, email) = match (name, email) {
        (Some(n), Some(e)) => (n, e),
        _ => return Err(ApiError::Validation("name and email are required".into())),
    };
    if !is_valid_email(email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }
    Ok((name.to_string(), email.to_string()))
}

pub async fn list_users(store: &dyn UserStore) -> Result<Vec<User>, ApiError> {
    Ok(store.list().await?)
}

pub async fn create_user(
    store: &dyn UserStore,
    name: Option<&str>,
    email: Option<&str>,
) -> Result<User, ApiError> {
    let (name, email) = validate(name, email)?;

    // Advisory pre-check; the store-level uniqueness constraint is what
    // actually holds under concurrent creates.
    if store.find_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("Email already in use".into()));
    }

    let user = store.insert(NewUser { name, email }).await?;
    info!(user_id = %user.id, email = %user.email, "user created");
    Ok(user)
}

pub async fn update_user(
    store: &dyn UserStore,
    id: Uuid,
    name: Option<&str>,
    email: Option<&str>,
) -> Result<User, ApiError> {
    let (name, email) = validate(name, email)?;

    if let Some(existing) = store.find_by_email(&email).await? {
        if existing.id != id {
            return Err(ApiError::Conflict("Email already in use".into()));
        }
    }

    let user = store
        .update(id, UserPatch { name, email })
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    info!(user_id = %user.id, "user updated");
    Ok(user)
}

/// Removes the record, then cleans up any avatar blob. Cleanup is
/// best-effort: the discarded result below is the whole contract.
pub async fn delete_user(state: &AppState, id: Uuid) -> Result<User, ApiError> {
    let user = state
        .store
        .delete(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if let Some(avatar) = &user.avatar {
        if let Err(e) = avatars::service::remove_blob(state, avatar).await {
            warn!(error = %e, user_id = %id, "avatar cleanup failed; user deleted anyway");
        }
    }

    info!(user_id = %id, "user deleted");
    Ok(user)
}
