//! User store repository

use super::types::{User, UserInfo};
use crate::error::{Error, Result};
use sqlx::SqlitePool;

/// Database access for user records
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, is_key_user, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// List all users (public view)
    pub async fn list(&self) -> Result<Vec<UserInfo>> {
        let users = sqlx::query_as::<_, UserInfo>(
            "SELECT id, username, is_key_user FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Insert a new user. Duplicate usernames surface as `Conflict`.
    pub async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        is_key_user: bool,
    ) -> Result<UserInfo> {
        let now = chrono::Utc::now();

        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, is_key_user, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(is_key_user)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(Error::Conflict("Username already exists".to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        self.get_by_username(username)
            .await?
            .map(|u| u.info())
            .ok_or(Error::Internal("User not found after insert".to_string()))
    }

    /// Replace a user's credential hash
    pub async fn set_password_hash(&self, username: &str, password_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE username = ?")
            .bind(password_hash)
            .bind(username)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound("User not found".to_string()));
        }

        Ok(())
    }

    /// True when no user record exists yet
    pub async fn is_empty(&self) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count == 0)
    }
}
