//! Device registry data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Device entity — one row per physical client, keyed by MAC address.
///
/// `order` is the assigned slot: 0 means unassigned, values above 0 are
/// unique and handed out monotonically. `hit_counter` always holds the
/// post-rollover value, i.e. it stays in `[0, max_hits)`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Device {
    #[serde(skip_serializing)]
    pub id: i64,
    pub mac_address: String,
    #[sqlx(rename = "device_order")]
    pub order: i64,
    pub hit_counter: i64,
    pub max_hits: i64,
    pub name: Option<String>,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub updated_at: DateTime<Utc>,
}

/// Admin update request for `POST /admin/device`
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDeviceRequest {
    pub mac_address: String,
    pub order: i64,
    pub max_hits: i64,
    pub name: Option<String>,
}

/// Response for `POST /device/register`
#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub order: i64,
    /// Duplicate of `order`, kept for client compatibility
    pub assigned: i64,
}

/// Response for `POST /device/hit`
#[derive(Debug, Clone, Serialize)]
pub struct HitResponse {
    pub counter: i64,
    pub max_hits: i64,
    pub order: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_serializes_visible_fields_only() {
        let device = Device {
            id: 7,
            mac_address: "AA:BB:CC:11:22:33".to_string(),
            order: 1,
            hit_counter: 4,
            max_hits: 9,
            name: Some("Device-112233-O1".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&device).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 5);
        assert!(obj.contains_key("mac_address"));
        assert!(obj.contains_key("order"));
        assert!(!obj.contains_key("id"));
        assert!(!obj.contains_key("updated_at"));
    }
}
