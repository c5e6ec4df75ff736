//! slotd - device slot allocation and hit counting server
//!
//! Devices on the local network register themselves by MAC address and
//! receive a stable numeric order slot; subsequent hits advance a rolling
//! counter that wraps at a per-device threshold. Monitor clients follow
//! live state over a server-sent-events change feed.

pub mod auth;
pub mod change_feed;
pub mod db;
pub mod device_registry;
pub mod error;
pub mod mac_resolver;
pub mod models;
pub mod state;
pub mod user_store;
pub mod web_api;

pub use error::{Error, Result};
