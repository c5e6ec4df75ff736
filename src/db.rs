//! Schema bootstrap
//!
//! Creates the tables on startup. Counter rollover is handled inside the
//! increment transaction in `device_registry`, not by a database trigger,
//! so the schema stays portable across storage backends.

use crate::error::Result;
use sqlx::SqlitePool;

/// Create tables if they do not exist yet
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS devices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            mac_address TEXT NOT NULL UNIQUE,
            device_order INTEGER NOT NULL DEFAULT 0,
            hit_counter INTEGER NOT NULL DEFAULT 0,
            max_hits INTEGER NOT NULL DEFAULT 9,
            name TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            is_key_user INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database schema ready");

    Ok(())
}
