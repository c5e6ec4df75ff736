//! Order slot allocation
//!
//! Slots are handed out monotonically and never reused: the next slot is
//! `max(order) + 1`, or 1 when no device holds a slot yet. Must run on the
//! same transaction as the registration insert so two concurrent
//! registrations cannot compute the same slot.

use crate::error::Result;
use sqlx::SqliteConnection;

use super::repository;

/// Compute the next free order slot
pub async fn next_order(conn: &mut SqliteConnection) -> Result<i64> {
    let max = repository::max_order(conn).await?;
    if max == 0 {
        Ok(1)
    } else {
        Ok(max + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn empty_registry_starts_at_one() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(next_order(&mut conn).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn allocation_is_max_plus_one() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        repository::insert(&mut conn, "AA:BB:CC:00:00:01", 1, "a")
            .await
            .unwrap();
        repository::insert(&mut conn, "AA:BB:CC:00:00:05", 5, "b")
            .await
            .unwrap();

        assert_eq!(next_order(&mut conn).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn unassigned_devices_do_not_block_slot_one() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        // order 0 means "unassigned" and must not count as an allocation
        repository::insert(&mut conn, "AA:BB:CC:00:00:09", 0, "c")
            .await
            .unwrap();

        assert_eq!(next_order(&mut conn).await.unwrap(), 1);
    }
}
