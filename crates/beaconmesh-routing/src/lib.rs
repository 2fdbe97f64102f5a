//! BeaconMesh Report Relaying
//!
//! Relay nodes flood mobile reports through the mesh:
//! - One held mobile report and one held relay report per duty cycle
//! - Hop budget (TTL) decremented at every relay
//! - Self-originated and exhausted reports are never re-flooded
//! - Held reports are consumed once and never retried

pub mod error;
pub mod relay;

pub use error::{Result, RoutingError};
pub use relay::{RelayEngine, RelayStats};
