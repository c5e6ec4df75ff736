//! Change feed - push-style state updates for monitor clients
//!
//! ## Responsibilities
//!
//! - Per-connection broadcast loop: snapshot the registry on an interval,
//!   diff against the last-sent snapshot by content fingerprint, and emit
//!   only deltas
//! - Heartbeat every fifth iteration so an idle feed never goes silent
//!   for long
//! - Fail-stop on errors: one terminal `error` event, then the connection
//!   ends and the client reconnects
//!
//! The diff and heartbeat bookkeeping lives in [`FeedCursor`], a pure state
//! machine; [`run_feed`] is the spawned per-connection task that pushes
//! events into an mpsc channel drained by the SSE response body. A dropped
//! receiver (peer disconnect) is observed at the top of each iteration.

use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio::time::Duration;
use uuid::Uuid;

use crate::state::AppState;
use crate::user_store::UserInfo;

/// Poll interval between loop iterations
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Heartbeat cadence, in loop iterations
pub const HEARTBEAT_EVERY: u32 = 5;

/// One outbound feed event: event name plus a JSON data line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEvent {
    pub name: &'static str,
    pub data: String,
}

impl FeedEvent {
    fn connected() -> Self {
        Self {
            name: "connected",
            data: json!({"message": "Connection established"}).to_string(),
        }
    }

    fn heartbeat(timestamp: i64) -> Self {
        Self {
            name: "heartbeat",
            data: json!({"timestamp": timestamp}).to_string(),
        }
    }

    fn error(message: &str) -> Self {
        Self {
            name: "error",
            data: json!({"message": message}).to_string(),
        }
    }
}

/// Content fingerprint of a serialized snapshot
fn fingerprint(payload: &str) -> String {
    use std::fmt::Write;
    let digest = Sha256::digest(payload.as_bytes());
    digest.iter().fold(String::new(), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

/// Per-connection diff and heartbeat state
#[derive(Debug, Default)]
pub struct FeedCursor {
    devices_fingerprint: Option<String>,
    users_fingerprint: Option<String>,
    tick: u32,
}

impl FeedCursor {
    /// Emit a `devices` event iff the snapshot content changed
    pub fn devices_event(&mut self, payload: String) -> Option<FeedEvent> {
        let fp = fingerprint(&payload);
        if self.devices_fingerprint.as_deref() == Some(fp.as_str()) {
            return None;
        }
        self.devices_fingerprint = Some(fp);
        Some(FeedEvent {
            name: "devices",
            data: payload,
        })
    }

    /// Emit a `users` event iff the snapshot content changed
    pub fn users_event(&mut self, payload: String) -> Option<FeedEvent> {
        let fp = fingerprint(&payload);
        if self.users_fingerprint.as_deref() == Some(fp.as_str()) {
            return None;
        }
        self.users_fingerprint = Some(fp);
        Some(FeedEvent {
            name: "users",
            data: payload,
        })
    }

    /// Count a loop iteration; every [`HEARTBEAT_EVERY`]th yields a heartbeat
    pub fn heartbeat(&mut self, timestamp: i64) -> Option<FeedEvent> {
        self.tick += 1;
        if self.tick >= HEARTBEAT_EVERY {
            self.tick = 0;
            Some(FeedEvent::heartbeat(timestamp))
        } else {
            None
        }
    }
}

async fn devices_payload(state: &AppState) -> crate::Result<String> {
    let devices = state.registry.list().await?;
    Ok(serde_json::to_string(&devices)?)
}

async fn users_payload(state: &AppState) -> crate::Result<String> {
    let users = state.users.list().await?;
    Ok(serde_json::to_string(&users)?)
}

/// The per-connection broadcast loop
///
/// Sends events until the peer disconnects (receiver dropped) or an error
/// occurs. Errors are reported once as an `error` event, then the loop
/// ends; resuming requires a fresh connection.
pub async fn run_feed(state: AppState, principal: UserInfo, tx: mpsc::Sender<FeedEvent>) {
    let connection_id = Uuid::new_v4();
    let elevated = principal.is_key_user;

    tracing::info!(
        connection_id = %connection_id,
        username = %principal.username,
        elevated = elevated,
        "Change feed client connected"
    );

    if tx.send(FeedEvent::connected()).await.is_err() {
        return;
    }

    let mut cursor = FeedCursor::default();

    loop {
        // Disconnect check: the SSE body holds the receiver, so a closed
        // channel means the peer went away.
        if tx.is_closed() {
            break;
        }

        let result = async {
            let payload = devices_payload(&state).await?;
            if let Some(event) = cursor.devices_event(payload) {
                if tx.send(event).await.is_err() {
                    return Ok(false);
                }
            }

            if elevated {
                let payload = users_payload(&state).await?;
                if let Some(event) = cursor.users_event(payload) {
                    if tx.send(event).await.is_err() {
                        return Ok(false);
                    }
                }
            }

            if let Some(event) = cursor.heartbeat(chrono::Utc::now().timestamp()) {
                if tx.send(event).await.is_err() {
                    return Ok(false);
                }
            }

            Ok::<bool, crate::Error>(true)
        }
        .await;

        match result {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                tracing::error!(connection_id = %connection_id, error = %e, "Change feed error");
                let _ = tx.send(FeedEvent::error(&e.to_string())).await;
                break;
            }
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }

    tracing::info!(connection_id = %connection_id, "Change feed client disconnected");
}
