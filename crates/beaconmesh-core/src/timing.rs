//! Duty-cycle timing profiles

use crate::state::{Phase, Role};
use serde::{Deserialize, Serialize};

/// Scheduler tick period (time units)
pub const DEFAULT_TICK_PERIOD: u64 = 50;

/// Scanning and advertising dwell of one role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDwell {
    pub scanning: u64,
    pub advertising: u64,
}

impl PhaseDwell {
    pub const fn new(scanning: u64, advertising: u64) -> Self {
        Self {
            scanning,
            advertising,
        }
    }

    pub fn of(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Scanning => self.scanning,
            Phase::Advertising => self.advertising,
        }
    }

    /// Length of one full cycle
    pub fn period(&self) -> u64 {
        self.scanning + self.advertising
    }
}

/// Timing for both roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyCycleTiming {
    pub tick_period: u64,
    pub mobile: PhaseDwell,
    pub relay: PhaseDwell,

    /// Relay advertising dwell when the long-advertising profile is on
    pub relay_long_advertising: u64,

    #[serde(default)]
    pub long_advertising: bool,
}

impl Default for DutyCycleTiming {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
            mobile: PhaseDwell::new(200, 50),
            relay: PhaseDwell::new(400, 100),
            relay_long_advertising: 250,
            long_advertising: false,
        }
    }
}

impl DutyCycleTiming {
    /// Default timing with the relay long-advertising profile
    pub fn long_advertising() -> Self {
        Self {
            long_advertising: true,
            ..Default::default()
        }
    }

    /// Effective dwells for `role`
    pub fn dwell(&self, role: Role) -> PhaseDwell {
        match role {
            Role::Mobile => self.mobile,
            Role::Relay if self.long_advertising => {
                PhaseDwell::new(self.relay.scanning, self.relay_long_advertising)
            }
            Role::Relay => self.relay,
        }
    }
}
