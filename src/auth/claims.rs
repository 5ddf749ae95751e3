use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bearer-token payload. Tokens are minted out-of-band (`JwtKeys::sign`);
/// the service only ever verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,   // user ID
    pub iat: usize,  // issued at (unix timestamp)
    pub exp: usize,  // expires at (unix timestamp)
    pub iss: String, // issuer
    pub aud: String, // audience
}
