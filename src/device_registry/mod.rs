//! Device registry - the device-state core
//!
//! ## Responsibilities
//!
//! - Durable device records keyed by MAC address
//! - Order slot allocation (monotonic, never reused)
//! - Hit counting with atomic rollover at `max_hits`
//! - Default display names for unnamed devices
//!
//! All writes run as single transactions serialized by the registry write
//! lock; reads are plain pool snapshots that may race benignly with writes.

mod allocator;
mod naming;
mod repository;
mod service;
mod types;

pub use naming::default_name;
pub use service::DeviceRegistry;
pub use types::*;
