//! User store - principal records
//!
//! ## Responsibilities
//!
//! - User (principal) persistence: username, credential hash, key-user flag
//! - Duplicate-username rejection on creation
//! - Password replacement
//! - First-run bootstrap of the initial key user

mod repository;
mod types;

pub use repository::UserRepository;
pub use types::*;

use crate::auth;
use crate::error::Result;
use sqlx::SqlitePool;

/// User store instance
pub struct UserStore {
    repo: UserRepository,
}

impl UserStore {
    /// Create new user store
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            repo: UserRepository::new(pool),
        }
    }

    /// Create a new user with a freshly hashed credential
    pub async fn create(&self, req: &CreateUserRequest) -> Result<UserInfo> {
        let hash = auth::hash_password(&req.password);
        let user = self
            .repo
            .insert(&req.username, &hash, req.is_key_user)
            .await?;

        tracing::info!(username = %user.username, is_key_user = user.is_key_user, "User created");

        Ok(user)
    }

    /// Replace a user's password
    pub async fn update_password(&self, req: &UpdatePasswordRequest) -> Result<()> {
        let hash = auth::hash_password(&req.password);
        self.repo.set_password_hash(&req.username, &hash).await?;

        tracing::info!(username = %req.username, "Password updated");

        Ok(())
    }

    /// Verify credentials, returning the user on success
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<UserInfo>> {
        let user = match self.repo.get_by_username(username).await? {
            Some(user) => user,
            None => return Ok(None),
        };

        if auth::verify_password(password, &user.password_hash) {
            Ok(Some(user.info()))
        } else {
            Ok(None)
        }
    }

    /// Look up a user by name (public view)
    pub async fn get(&self, username: &str) -> Result<Option<UserInfo>> {
        Ok(self.repo.get_by_username(username).await?.map(|u| u.info()))
    }

    /// List all users
    pub async fn list(&self) -> Result<Vec<UserInfo>> {
        self.repo.list().await
    }

    /// Create the first key user when the table is empty. Returns true when
    /// a user was created.
    pub async fn bootstrap(&self, username: &str, password: &str) -> Result<bool> {
        if !self.repo.is_empty().await? {
            return Ok(false);
        }

        self.create(&CreateUserRequest {
            username: username.to_string(),
            password: password.to_string(),
            is_key_user: true,
        })
        .await?;

        tracing::info!(username = %username, "Bootstrap key user created");

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_store() -> UserStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_schema(&pool).await.unwrap();
        UserStore::new(pool)
    }

    fn create_req(username: &str, password: &str, is_key_user: bool) -> CreateUserRequest {
        CreateUserRequest {
            username: username.to_string(),
            password: password.to_string(),
            is_key_user,
        }
    }

    #[tokio::test]
    async fn create_and_authenticate() {
        let store = test_store().await;
        store.create(&create_req("alice", "s3cret", true)).await.unwrap();

        let user = store.authenticate("alice", "s3cret").await.unwrap();
        assert!(user.unwrap().is_key_user);

        let wrong = store.authenticate("alice", "nope").await.unwrap();
        assert!(wrong.is_none());

        let unknown = store.authenticate("bob", "s3cret").await.unwrap();
        assert!(unknown.is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_conflict() {
        let store = test_store().await;
        store.create(&create_req("alice", "a", false)).await.unwrap();

        let err = store.create(&create_req("alice", "b", false)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn password_update_for_unknown_user_is_not_found() {
        let store = test_store().await;

        let err = store
            .update_password(&UpdatePasswordRequest {
                username: "ghost".to_string(),
                password: "x".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn password_update_replaces_credential() {
        let store = test_store().await;
        store.create(&create_req("alice", "old", false)).await.unwrap();

        store
            .update_password(&UpdatePasswordRequest {
                username: "alice".to_string(),
                password: "new".to_string(),
            })
            .await
            .unwrap();

        assert!(store.authenticate("alice", "old").await.unwrap().is_none());
        assert!(store.authenticate("alice", "new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn bootstrap_only_runs_on_empty_store() {
        let store = test_store().await;

        assert!(store.bootstrap("admin", "pw").await.unwrap());
        assert!(!store.bootstrap("admin2", "pw").await.unwrap());

        let users = store.list().await.unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].is_key_user);
    }
}
