//! BeaconMesh Radio Abstraction Layer
//!
//! This module provides the radio capability the mesh core runs on:
//! - The `RadioLink` trait (scan/advertise control, inbound frame queue)
//! - Radio activity metrics
//! - A simulated shared medium for running whole meshes in-process

pub mod adapter;
pub mod adapters;
pub mod error;
pub mod metrics;

pub use adapter::{
    frame_channel, AdvKind, FrameReceiver, FrameSender, RadioLink, RadioStatus, ReceivedFrame,
};
pub use adapters::{Position, PropagationConfig, SimulatedAir, SimulatedRadio};
pub use error::{NetworkError, Result};
pub use metrics::RadioMetrics;
