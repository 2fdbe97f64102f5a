//! BeaconNode
//!
//! Runs a BeaconMesh deployment in-process: the local node, its simulated
//! peers and beacons on a shared air, and a base station that prints every
//! report it hears as a JSON line.

pub mod base;
pub mod config;
pub mod node;

pub use base::{BaseStation, ReportRecord};
pub use config::Config;
pub use node::Node;
