//! "Too close" latch
//!
//! A single reading stronger than the threshold latches the alarm. Only time
//! clears it: once no qualifying reading has arrived for longer than the
//! clear window, the next tick releases it.

use beaconmesh_protocol::NodeId;
use log::debug;
use serde::{Deserialize, Serialize};

/// Default latch threshold (dBm)
pub const DEFAULT_PROXIMITY_THRESHOLD: i8 = -55;

/// Default clear window (time units)
pub const DEFAULT_CLEAR_AFTER: u64 = 1500;

/// Proximity latch configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProximityConfig {
    /// Readings strictly above this latch
    pub threshold: i8,

    /// Time without a qualifying reading before the latch clears
    pub clear_after: u64,

    /// Peer whose reports feed the latch; any peer when unset
    #[serde(default)]
    pub peer: Option<NodeId>,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PROXIMITY_THRESHOLD,
            clear_after: DEFAULT_CLEAR_AFTER,
            peer: None,
        }
    }
}

impl ProximityConfig {
    /// Whether reports from `node` feed the latch
    pub fn tracks(&self, node: NodeId) -> bool {
        self.peer.map_or(true, |peer| peer == node)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProximityLatch {
    threshold: i8,
    clear_after: u64,
    latched: bool,
    latched_at: u64,
}

impl ProximityLatch {
    pub fn new(config: &ProximityConfig) -> Self {
        Self {
            threshold: config.threshold,
            clear_after: config.clear_after,
            latched: false,
            latched_at: 0,
        }
    }

    /// Feed one reading taken at `now`
    pub fn update(&mut self, strength: i8, now: u64) {
        if strength > self.threshold {
            if !self.latched {
                debug!("Proximity latched at {} ({} dBm)", now, strength);
            }
            self.latched = true;
            self.latched_at = now;
        }
    }

    /// Periodic timeout check
    pub fn tick(&mut self, now: u64) {
        if self.latched && now.saturating_sub(self.latched_at) > self.clear_after {
            debug!("Proximity cleared at {}", now);
            self.latched = false;
        }
    }

    pub fn is_too_close(&self) -> bool {
        self.latched
    }

    /// Time of the last qualifying reading, if latched
    pub fn latched_at(&self) -> Option<u64> {
        self.latched.then_some(self.latched_at)
    }
}

impl Default for ProximityLatch {
    fn default() -> Self {
        Self::new(&ProximityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holds_for_clear_window() {
        let mut latch = ProximityLatch::default();
        latch.update(-40, 0);
        assert!(latch.is_too_close());

        let mut now = 0;
        while now <= 1500 {
            latch.tick(now);
            assert!(latch.is_too_close(), "cleared early at {}", now);
            now += 50;
        }

        latch.tick(now);
        assert_eq!(now, 1550);
        assert!(!latch.is_too_close());
    }

    #[test]
    fn test_weak_reading_never_clears() {
        let mut latch = ProximityLatch::default();
        latch.update(-40, 0);
        latch.update(-90, 100);
        latch.tick(100);
        assert!(latch.is_too_close());
        assert_eq!(latch.latched_at(), Some(0));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let mut latch = ProximityLatch::default();
        latch.update(DEFAULT_PROXIMITY_THRESHOLD, 0);
        assert!(!latch.is_too_close());
        latch.update(DEFAULT_PROXIMITY_THRESHOLD + 1, 0);
        assert!(latch.is_too_close());
    }

    #[test]
    fn test_new_reading_extends_latch() {
        let mut latch = ProximityLatch::default();
        latch.update(-40, 0);
        latch.update(-45, 1000);
        latch.tick(2000);
        assert!(latch.is_too_close());
        latch.tick(2550);
        assert!(!latch.is_too_close());
        assert_eq!(latch.latched_at(), None);
    }

    #[test]
    fn test_peer_filter() {
        let any = ProximityConfig::default();
        assert!(any.tracks(NodeId::new(9)));

        let config = ProximityConfig {
            peer: Some(NodeId::new(2)),
            ..Default::default()
        };
        assert!(config.tracks(NodeId::new(2)));
        assert!(!config.tracks(NodeId::new(3)));
    }
}
