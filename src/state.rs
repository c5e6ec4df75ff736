//! Application state
//!
//! Holds all shared components and configuration.

use crate::device_registry::DeviceRegistry;
use crate::user_store::UserStore;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Database URL
    pub database_url: String,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT signing secret
    pub jwt_secret: String,
    /// First key user, created at startup when no user exists
    pub admin_user: Option<String>,
    /// Password for the bootstrap key user
    pub admin_password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://slotd.db".to_string()),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            jwt_secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| "change-this-secret-in-production".to_string()),
            admin_user: std::env::var("SLOTD_ADMIN_USER").ok(),
            admin_password: std::env::var("SLOTD_ADMIN_PASSWORD").ok(),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database pool
    pub pool: SqlitePool,
    /// Application config
    pub config: AppConfig,
    /// Device registry (slot allocation, hit counting)
    pub registry: Arc<DeviceRegistry>,
    /// User store (principals)
    pub users: Arc<UserStore>,
}
