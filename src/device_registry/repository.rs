//! Device registry repository
//!
//! Raw SQL against an explicit connection handle. Every function takes
//! `&mut SqliteConnection` so the caller controls the transaction
//! boundary; multi-step operations in `service.rs` run all their reads
//! and writes on one transaction.

use super::types::Device;
use crate::error::{Error, Result};
use sqlx::SqliteConnection;

/// Device SELECT columns
const DEVICE_COLUMNS: &str = r#"
    id, mac_address, device_order, hit_counter, max_hits, name,
    created_at, updated_at
"#;

/// Get device by MAC address
pub async fn get_by_mac(conn: &mut SqliteConnection, mac_address: &str) -> Result<Option<Device>> {
    let query = format!(
        "SELECT {} FROM devices WHERE mac_address = ?",
        DEVICE_COLUMNS
    );
    let device = sqlx::query_as::<_, Device>(&query)
        .bind(mac_address)
        .fetch_optional(conn)
        .await?;

    Ok(device)
}

/// Get all devices, ordered by slot
pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Device>> {
    let query = format!(
        "SELECT {} FROM devices ORDER BY device_order, mac_address",
        DEVICE_COLUMNS
    );
    let devices = sqlx::query_as::<_, Device>(&query).fetch_all(conn).await?;

    Ok(devices)
}

/// Highest slot currently assigned, 0 when the table is empty
pub async fn max_order(conn: &mut SqliteConnection) -> Result<i64> {
    let (max,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(device_order), 0) FROM devices")
        .fetch_one(conn)
        .await?;

    Ok(max)
}

/// Insert a freshly registered device
pub async fn insert(
    conn: &mut SqliteConnection,
    mac_address: &str,
    order: i64,
    name: &str,
) -> Result<Device> {
    let now = chrono::Utc::now();

    sqlx::query(
        r#"
        INSERT INTO devices (mac_address, device_order, hit_counter, max_hits, name, created_at, updated_at)
        VALUES (?, ?, 0, 9, ?, ?, ?)
        "#,
    )
    .bind(mac_address)
    .bind(order)
    .bind(name)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    get_by_mac(conn, mac_address)
        .await?
        .ok_or(Error::Internal("Device not found after insert".to_string()))
}

/// Set the display name
pub async fn update_name(conn: &mut SqliteConnection, id: i64, name: &str) -> Result<()> {
    let now = chrono::Utc::now();

    sqlx::query("UPDATE devices SET name = ?, updated_at = ? WHERE id = ?")
        .bind(name)
        .bind(now)
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Write the post-rollover counter value, back-filling the name
pub async fn update_hit(
    conn: &mut SqliteConnection,
    id: i64,
    hit_counter: i64,
    name: &str,
) -> Result<()> {
    let now = chrono::Utc::now();

    sqlx::query("UPDATE devices SET hit_counter = ?, name = ?, updated_at = ? WHERE id = ?")
        .bind(hit_counter)
        .bind(name)
        .bind(now)
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Admin update of slot, threshold and name
pub async fn update_admin(
    conn: &mut SqliteConnection,
    id: i64,
    order: i64,
    max_hits: i64,
    name: &str,
) -> Result<()> {
    let now = chrono::Utc::now();

    sqlx::query(
        "UPDATE devices SET device_order = ?, max_hits = ?, name = ?, updated_at = ? WHERE id = ?",
    )
    .bind(order)
    .bind(max_hits)
    .bind(name)
    .bind(now)
    .bind(id)
    .execute(conn)
    .await?;

    Ok(())
}
