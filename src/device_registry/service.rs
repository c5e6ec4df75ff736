//! Device registry service
//!
//! The three write operations (register, hit, admin update) each run as one
//! transaction under the registry write lock, so slot allocation and counter
//! rollover stay indivisible under concurrent callers. Reads for listing and
//! broadcasting go straight to the pool and never take the lock.

use sqlx::SqlitePool;
use tokio::sync::Mutex;

use super::allocator;
use super::naming;
use super::repository;
use super::types::{Device, UpdateDeviceRequest};
use crate::error::{Error, Result};

/// Device registry instance
pub struct DeviceRegistry {
    pool: SqlitePool,
    /// Serializes all write transactions. SQLite already has a single
    /// writer, but the lock makes the read-compute-write sequences
    /// (allocate slot, roll over counter) indivisible without leaning on
    /// driver-level isolation.
    write_lock: Mutex<()>,
}

impl DeviceRegistry {
    /// Create new registry on an initialized pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    /// Register the device for `mac_address`, allocating a slot on first
    /// contact. Idempotent: repeated calls return the existing record. A
    /// device still missing a display name gets the derived default.
    pub async fn register(&self, mac_address: &str) -> Result<Device> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let device = match repository::get_by_mac(&mut tx, mac_address).await? {
            Some(device) if device.name.is_some() => device,
            Some(device) => {
                let name = naming::default_name(mac_address, device.order);
                repository::update_name(&mut tx, device.id, &name).await?;
                Device {
                    name: Some(name),
                    ..device
                }
            }
            None => {
                let order = allocator::next_order(&mut tx).await?;
                let name = naming::default_name(mac_address, order);
                let device = repository::insert(&mut tx, mac_address, order, &name).await?;
                tracing::info!(mac = %mac_address, order = order, "Device registered");
                device
            }
        };

        tx.commit().await?;

        Ok(device)
    }

    /// Increment the hit counter, rolling over to 0 when the result reaches
    /// `max_hits`. The read, the increment and the conditional reset commit
    /// as one transaction; callers only ever observe the post-rollover
    /// value.
    pub async fn record_hit(&self, mac_address: &str) -> Result<Device> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let device = repository::get_by_mac(&mut tx, mac_address)
            .await?
            .ok_or_else(|| Error::BadRequest("Device not found".to_string()))?;

        let mut counter = device.hit_counter + 1;
        if counter >= device.max_hits {
            counter = 0;
        }

        let name = match device.name {
            Some(ref name) => name.clone(),
            None => naming::default_name(mac_address, device.order),
        };

        repository::update_hit(&mut tx, device.id, counter, &name).await?;
        tx.commit().await?;

        tracing::debug!(mac = %mac_address, counter = counter, "Hit recorded");

        Ok(Device {
            hit_counter: counter,
            name: Some(name),
            ..device
        })
    }

    /// Admin update of slot, threshold and name. An explicit `name`
    /// replaces the current one; otherwise an existing name is preserved
    /// verbatim and only a nameless device gets the derived default for
    /// its new slot.
    pub async fn admin_update(&self, req: &UpdateDeviceRequest) -> Result<Device> {
        // The stored invariant is hit_counter in [0, max_hits); a threshold
        // below 1 would pin the counter at 0 forever.
        if req.max_hits < 1 {
            return Err(Error::BadRequest(
                "max_hits must be a positive integer".to_string(),
            ));
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let device = repository::get_by_mac(&mut tx, &req.mac_address)
            .await?
            .ok_or_else(|| Error::NotFound("Device not found".to_string()))?;

        let name = match req.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => match device.name {
                Some(ref name) => name.clone(),
                None => naming::default_name(&req.mac_address, req.order),
            },
        };

        repository::update_admin(&mut tx, device.id, req.order, req.max_hits, &name).await?;
        tx.commit().await?;

        tracing::info!(
            mac = %req.mac_address,
            order = req.order,
            max_hits = req.max_hits,
            "Device updated by admin"
        );

        Ok(Device {
            order: req.order,
            max_hits: req.max_hits,
            name: Some(name),
            ..device
        })
    }

    /// Snapshot of all devices, ordered by slot
    pub async fn list(&self) -> Result<Vec<Device>> {
        let mut conn = self.pool.acquire().await?;
        repository::list(&mut conn).await
    }

    /// Look up a single device
    pub async fn get(&self, mac_address: &str) -> Result<Option<Device>> {
        let mut conn = self.pool.acquire().await?;
        repository::get_by_mac(&mut conn, mac_address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_registry() -> DeviceRegistry {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_schema(&pool).await.unwrap();
        DeviceRegistry::new(pool)
    }

    #[tokio::test]
    async fn registration_assigns_increasing_orders() {
        let registry = test_registry().await;

        let first = registry.register("AA:BB:CC:11:22:33").await.unwrap();
        let second = registry.register("AA:BB:CC:11:22:44").await.unwrap();

        assert_eq!(first.order, 1);
        assert_eq!(second.order, 2);
    }

    #[tokio::test]
    async fn registration_is_idempotent() {
        let registry = test_registry().await;

        let first = registry.register("AA:BB:CC:11:22:33").await.unwrap();
        let again = registry.register("AA:BB:CC:11:22:33").await.unwrap();

        assert_eq!(first.order, again.order);
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn new_device_gets_default_name_and_zero_counter() {
        let registry = test_registry().await;

        let device = registry.register("AA:BB:CC:11:22:33").await.unwrap();

        assert_eq!(device.name.as_deref(), Some("Device-112233-O1"));
        assert_eq!(device.hit_counter, 0);
        assert_eq!(device.max_hits, 9);
    }

    #[tokio::test]
    async fn counter_is_hits_modulo_max() {
        let registry = test_registry().await;
        registry.register("AA:BB:CC:11:22:33").await.unwrap();

        for n in 1..=20i64 {
            let device = registry.record_hit("AA:BB:CC:11:22:33").await.unwrap();
            assert_eq!(device.hit_counter, n % 9, "after {} hits", n);
        }
    }

    #[tokio::test]
    async fn ninth_hit_rolls_over_to_zero() {
        let registry = test_registry().await;
        registry.register("AA:BB:CC:11:22:33").await.unwrap();

        for _ in 0..8 {
            registry.record_hit("AA:BB:CC:11:22:33").await.unwrap();
        }
        let before = registry.get("AA:BB:CC:11:22:33").await.unwrap().unwrap();
        assert_eq!(before.hit_counter, 8);

        let device = registry.record_hit("AA:BB:CC:11:22:33").await.unwrap();
        assert_eq!(device.hit_counter, 0);
    }

    #[tokio::test]
    async fn lowered_max_hits_rolls_over_earlier() {
        let registry = test_registry().await;
        registry.register("AA:BB:CC:11:22:33").await.unwrap();

        registry
            .admin_update(&UpdateDeviceRequest {
                mac_address: "AA:BB:CC:11:22:33".to_string(),
                order: 1,
                max_hits: 3,
                name: None,
            })
            .await
            .unwrap();

        assert_eq!(
            registry
                .record_hit("AA:BB:CC:11:22:33")
                .await
                .unwrap()
                .hit_counter,
            1
        );
        assert_eq!(
            registry
                .record_hit("AA:BB:CC:11:22:33")
                .await
                .unwrap()
                .hit_counter,
            2
        );
        assert_eq!(
            registry
                .record_hit("AA:BB:CC:11:22:33")
                .await
                .unwrap()
                .hit_counter,
            0
        );
    }

    #[tokio::test]
    async fn hit_on_unknown_device_is_bad_request() {
        let registry = test_registry().await;

        let err = registry.record_hit("00:00:00:00:00:01").await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn non_positive_max_hits_is_bad_request() {
        let registry = test_registry().await;
        registry.register("AA:BB:CC:11:22:33").await.unwrap();

        for max_hits in [0, -1] {
            let err = registry
                .admin_update(&UpdateDeviceRequest {
                    mac_address: "AA:BB:CC:11:22:33".to_string(),
                    order: 1,
                    max_hits,
                    name: None,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, Error::BadRequest(_)), "max_hits {}", max_hits);
        }

        // The rejected update must not have touched the record
        let device = registry.get("AA:BB:CC:11:22:33").await.unwrap().unwrap();
        assert_eq!(device.max_hits, 9);
    }

    #[tokio::test]
    async fn admin_update_on_unknown_device_is_not_found() {
        let registry = test_registry().await;

        let err = registry
            .admin_update(&UpdateDeviceRequest {
                mac_address: "00:00:00:00:00:01".to_string(),
                order: 1,
                max_hits: 9,
                name: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn admin_rename_is_sticky() {
        let registry = test_registry().await;
        registry.register("AA:BB:CC:11:22:33").await.unwrap();

        registry
            .admin_update(&UpdateDeviceRequest {
                mac_address: "AA:BB:CC:11:22:33".to_string(),
                order: 1,
                max_hits: 9,
                name: Some("Lobby-Sensor".to_string()),
            })
            .await
            .unwrap();

        let device = registry.record_hit("AA:BB:CC:11:22:33").await.unwrap();
        assert_eq!(device.name.as_deref(), Some("Lobby-Sensor"));

        let again = registry.register("AA:BB:CC:11:22:33").await.unwrap();
        assert_eq!(again.name.as_deref(), Some("Lobby-Sensor"));
    }

    #[tokio::test]
    async fn admin_update_without_name_keeps_existing_name() {
        let registry = test_registry().await;
        registry.register("AA:BB:CC:11:22:33").await.unwrap();

        let device = registry
            .admin_update(&UpdateDeviceRequest {
                mac_address: "AA:BB:CC:11:22:33".to_string(),
                order: 5,
                max_hits: 100,
                name: None,
            })
            .await
            .unwrap();

        assert_eq!(device.name.as_deref(), Some("Device-112233-O1"));
        assert_eq!(device.order, 5);
        assert_eq!(device.max_hits, 100);
    }

    #[tokio::test]
    async fn registration_backfills_missing_name() {
        let registry = test_registry().await;

        // Simulate an externally written nameless row
        let now = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO devices (mac_address, device_order, hit_counter, max_hits, name, created_at, updated_at) \
             VALUES (?, 3, 0, 9, NULL, ?, ?)",
        )
        .bind("AA:BB:CC:11:22:55")
        .bind(now)
        .bind(now)
        .execute(&registry.pool)
        .await
        .unwrap();

        let device = registry.register("AA:BB:CC:11:22:55").await.unwrap();
        assert_eq!(device.order, 3);
        assert_eq!(device.name.as_deref(), Some("Device-112255-O3"));
    }
}
