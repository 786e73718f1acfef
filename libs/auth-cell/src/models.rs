use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub is_provider: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionRequest {
    pub email: String,
    pub password: String,
}

/// Full account row as stored. Never serialized back to clients.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_provider: bool,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_provider: bool,
    pub avatar_url: Option<String>,
}

impl UserRow {
    pub fn into_public(self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name,
            email: self.email,
            is_provider: self.is_provider,
            avatar_url: self.avatar_url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub user: PublicUser,
    pub token: String,
}
