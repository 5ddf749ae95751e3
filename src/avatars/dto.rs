use serde::Serialize;
use uuid::Uuid;

use crate::users::model::User;

/// Shape echoed back by the avatar endpoints: the directory fields plus the
/// current avatar reference, without timestamps.
#[derive(Debug, Serialize)]
pub struct UserProjection {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl From<User> for UserProjection {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            avatar: u.avatar,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AvatarData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub user: UserProjection,
}

#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub success: bool,
    pub message: String,
    pub data: AvatarData,
}
