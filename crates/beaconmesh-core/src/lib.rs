//! BeaconMesh Core Library
//!
//! Ties the mesh components together into a runnable node:
//! - Protocol (wire records, advertisement classification)
//! - Network (radio link, simulated air)
//! - Routing (relay engine)
//! - Beacon tracking, proximity latch and the duty-cycle scheduler

pub mod error;
pub mod proximity;
pub mod scheduler;
pub mod state;
pub mod strategy;
pub mod timing;
pub mod tracker;

pub use beaconmesh_network as network;
pub use beaconmesh_protocol as protocol;
pub use beaconmesh_routing as routing;

pub use error::{CoreError, Result};
pub use proximity::{ProximityConfig, ProximityLatch};
pub use scheduler::{DutyCycleScheduler, NodeConfig, SchedulerStats};
pub use state::{IndicatorState, NodeState, Phase, Role};
pub use strategy::{MobileStrategy, RelayStrategy, RoleStrategy};
pub use timing::{DutyCycleTiming, PhaseDwell};
pub use tracker::BeaconTracker;
