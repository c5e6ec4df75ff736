//! User store data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User row, including the credential hash. Never serialized to clients.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub is_key_user: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn info(&self) -> UserInfo {
        UserInfo {
            id: self.id,
            username: self.username.clone(),
            is_key_user: self.is_key_user,
        }
    }
}

/// Public view of a user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub is_key_user: bool,
}

/// Request for `POST /admin/user`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_key_user: bool,
}

/// Request for `POST /admin/user/password`
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePasswordRequest {
    pub username: String,
    pub password: String,
}
