use serde::{Deserialize, Serialize};

/// Fields are optional so that a missing field reaches the service layer and
/// comes back as a 400 with the usual envelope instead of a deserializer
/// rejection. Unknown fields are dropped here, never merged into the record.
#[derive(Debug, Deserialize)]
pub struct UserWriteRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}
