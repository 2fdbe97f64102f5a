//! Radio implementations

pub mod simulated;

pub use simulated::{Position, PropagationConfig, SimulatedAir, SimulatedRadio};
