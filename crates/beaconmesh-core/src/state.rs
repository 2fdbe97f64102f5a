//! Per-node state

use crate::proximity::{ProximityConfig, ProximityLatch};
use crate::tracker::BeaconTracker;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Duty-cycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Scanning,
    Advertising,
}

impl Phase {
    pub fn next(self) -> Self {
        match self {
            Phase::Scanning => Phase::Advertising,
            Phase::Advertising => Phase::Scanning,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Scanning => write!(f, "Scanning"),
            Phase::Advertising => write!(f, "Advertising"),
        }
    }
}

/// Node role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Battery tag that reports the beacons it hears
    Mobile,
    /// Fixed node that floods reports towards the base station
    Relay,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Mobile => write!(f, "mobile"),
            Role::Relay => write!(f, "relay"),
        }
    }
}

/// What an indicator LED should show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorState {
    Off,
    /// Node is advertising
    Blink,
    /// Proximity alarm
    Steady,
}

impl IndicatorState {
    pub fn from_node(too_close: bool, phase: Phase) -> Self {
        if too_close {
            IndicatorState::Steady
        } else if phase == Phase::Advertising {
            IndicatorState::Blink
        } else {
            IndicatorState::Off
        }
    }
}

/// Mutable state of one node, owned by its scheduler
///
/// Held relay/mobile reports live in the relay engine of the relay role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
    pub phase: Phase,
    pub phase_started_at: u64,
    pub proximity: ProximityLatch,
    pub beacons: BeaconTracker,

    /// Relay only: honor mobile reports during this scanning dwell
    pub alternate_for_mobile: bool,

    /// Mobile only: dwell clock already aligned to a peer this dwell
    pub already_corrected: bool,
}

impl NodeState {
    pub fn new(proximity: &ProximityConfig) -> Self {
        Self {
            phase: Phase::Scanning,
            phase_started_at: 0,
            proximity: ProximityLatch::new(proximity),
            beacons: BeaconTracker::new(),
            alternate_for_mobile: false,
            already_corrected: false,
        }
    }

    /// Time spent in the current phase
    pub fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.phase_started_at)
    }
}

impl Default for NodeState {
    fn default() -> Self {
        Self::new(&ProximityConfig::default())
    }
}
