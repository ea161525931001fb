use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated user as carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
}

/// JWT payload issued on login and registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,      // user ID
    pub name: String,  // display name at signing time
    pub iat: usize,    // issued at (unix timestamp)
    pub exp: usize,    // expires at (unix timestamp)
    pub iss: String,   // issuer
    pub aud: String,   // audience
}

impl From<Claims> for Identity {
    fn from(c: Claims) -> Self {
        Self { id: c.id, name: c.name }
    }
}
