use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record. Ids are store-assigned UUIDv4 and immutable; callers must
/// not assume any other identifier format.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Opaque tag, passed through without validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Public URL of the user's avatar blob, if one is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub created_at: OffsetDateTime,
}
