//! Store-and-forward relay engine
//!
//! A relay node holds at most one mobile report and one relay report per
//! duty cycle. When it starts advertising it re-floods the held relay report
//! with one hop less, or, if it has none, originates a new relay report
//! around the held mobile report. Whatever was held is dropped once the
//! advertising dwell ends; nothing is retried in a later cycle.
//!
//! Loop prevention:
//! - a report carrying our own id as origin is never re-flooded
//! - a report with ttl <= 1 has no hops left and is never re-flooded

use crate::error::{Result, RoutingError};
use beaconmesh_protocol::{MobileReport, NodeId, RelayReport};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

/// Relay statistics
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStats {
    pub mobile_captured: u64,
    pub relay_captured: u64,
    pub dropped_self_loop: u64,
    pub dropped_ttl: u64,
    pub forwarded: u64,
    pub originated: u64,
    /// Held reports cleared at the end of a cycle without being sent
    pub expired_unsent: u64,
}

/// Relay engine for one relay node
#[derive(Debug, Clone)]
pub struct RelayEngine {
    node_id: NodeId,
    held_mobile: Option<MobileReport>,
    held_relay: Option<RelayReport>,
    /// What was committed for the current advertising dwell
    outgoing: Option<RelayReport>,
    stats: RelayStats,
}

impl RelayEngine {
    pub fn new(node_id: NodeId) -> Self {
        RelayEngine {
            node_id,
            held_mobile: None,
            held_relay: None,
            outgoing: None,
            stats: RelayStats::default(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Hold a freshly observed mobile report, replacing any older one
    pub fn offer_mobile(&mut self, report: MobileReport) {
        if let Some(previous) = self.held_mobile.replace(report) {
            trace!(
                "Mobile report from {} superseded by one from {}",
                previous.mobile_id,
                report.mobile_id
            );
        }
        self.stats.mobile_captured += 1;
    }

    /// Hold a relay report if this node may forward it
    pub fn offer_relay(&mut self, report: RelayReport) -> Result<()> {
        if report.origin_id == self.node_id {
            self.stats.dropped_self_loop += 1;
            return Err(RoutingError::SelfLoop(report.origin_id));
        }

        if report.ttl <= 1 {
            self.stats.dropped_ttl += 1;
            return Err(RoutingError::TtlExhausted(report.ttl));
        }

        debug_assert!(report.is_forwardable_by(self.node_id));
        self.held_relay = Some(report);
        self.stats.relay_captured += 1;
        Ok(())
    }

    /// Pick the report to advertise for this cycle
    ///
    /// A held relay report wins over a held mobile report. Calling this again
    /// before [`clear`](Self::clear) returns the same report.
    pub fn compose(&mut self) -> Option<RelayReport> {
        if self.outgoing.is_some() {
            return self.outgoing;
        }

        if let Some(relay) = self.held_relay.as_mut() {
            relay.ttl -= 1;
            self.stats.forwarded += 1;
            debug!(
                "Forwarding report from origin {} (mobile {}), ttl now {}",
                relay.origin_id, relay.payload.mobile_id, relay.ttl
            );
            self.outgoing = Some(*relay);
        } else if let Some(mobile) = self.held_mobile {
            let relay = RelayReport::originate(self.node_id, mobile);
            self.stats.originated += 1;
            debug!(
                "Originating relay report for mobile {}, ttl {}",
                mobile.mobile_id, relay.ttl
            );
            self.outgoing = Some(relay);
        }

        self.outgoing
    }

    /// Drop everything held for the cycle that just ended
    pub fn clear(&mut self) {
        let held = self.held_mobile.is_some() as u64 + self.held_relay.is_some() as u64;
        let sent = self.outgoing.is_some() as u64;
        self.stats.expired_unsent += held.saturating_sub(sent);

        self.held_mobile = None;
        self.held_relay = None;
        self.outgoing = None;
    }

    pub fn held_mobile(&self) -> Option<&MobileReport> {
        self.held_mobile.as_ref()
    }

    pub fn held_relay(&self) -> Option<&RelayReport> {
        self.held_relay.as_ref()
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beaconmesh_protocol::BeaconReading;

    fn mobile(id: u8) -> MobileReport {
        MobileReport::new(
            NodeId::new(id),
            [
                BeaconReading::new(b'A', -60),
                BeaconReading::new(b'B', -70),
                BeaconReading::new(b'C', -80),
            ],
            0,
            0,
        )
    }

    fn relay(ttl: i8, origin: u8) -> RelayReport {
        RelayReport {
            ttl,
            origin_id: NodeId::new(origin),
            payload: mobile(1),
        }
    }

    #[test]
    fn test_forward_decrements_ttl() {
        let mut engine = RelayEngine::new(NodeId::new(5));
        engine.offer_relay(relay(3, 7)).unwrap();

        let out = engine.compose().unwrap();
        assert_eq!(out.ttl, 2);
        assert_eq!(out.origin_id, NodeId::new(7));
        assert_eq!(out.payload, mobile(1));
        // The held record itself was decremented
        assert_eq!(engine.held_relay().unwrap().ttl, 2);
    }

    #[test]
    fn test_compose_is_stable_within_cycle() {
        let mut engine = RelayEngine::new(NodeId::new(5));
        engine.offer_relay(relay(4, 7)).unwrap();

        assert_eq!(engine.compose().unwrap().ttl, 3);
        assert_eq!(engine.compose().unwrap().ttl, 3);
        assert_eq!(engine.stats().forwarded, 1);
    }

    #[test]
    fn test_expired_report_dropped() {
        let mut engine = RelayEngine::new(NodeId::new(5));
        assert_eq!(
            engine.offer_relay(relay(1, 9)),
            Err(RoutingError::TtlExhausted(1))
        );
        assert!(engine.held_relay().is_none());
        assert!(engine.compose().is_none());
        assert_eq!(engine.stats().dropped_ttl, 1);
    }

    #[test]
    fn test_self_loop_dropped() {
        let mut engine = RelayEngine::new(NodeId::new(5));
        assert_eq!(
            engine.offer_relay(relay(4, 5)),
            Err(RoutingError::SelfLoop(NodeId::new(5)))
        );
        assert!(engine.compose().is_none());
        assert_eq!(engine.stats().dropped_self_loop, 1);
    }

    #[test]
    fn test_relay_has_priority_over_mobile() {
        let mut engine = RelayEngine::new(NodeId::new(5));
        engine.offer_mobile(mobile(2));
        engine.offer_relay(relay(3, 7)).unwrap();

        let out = engine.compose().unwrap();
        assert_eq!(out.origin_id, NodeId::new(7));
        assert_eq!(out.payload.mobile_id, NodeId::new(1));

        engine.clear();
        assert_eq!(engine.stats().expired_unsent, 1);
    }

    #[test]
    fn test_mobile_wrapped_as_new_relay() {
        let mut engine = RelayEngine::new(NodeId::new(5));
        engine.offer_mobile(mobile(2));
        engine.offer_mobile(mobile(3));

        let out = engine.compose().unwrap();
        assert_eq!(out.ttl, 4);
        assert_eq!(out.origin_id, NodeId::new(5));
        assert_eq!(out.payload.mobile_id, NodeId::new(3));
        assert_eq!(engine.stats().originated, 1);
    }

    #[test]
    fn test_clear_is_one_shot() {
        let mut engine = RelayEngine::new(NodeId::new(5));
        engine.offer_mobile(mobile(2));
        engine.offer_relay(relay(2, 7)).unwrap();
        engine.compose();
        engine.clear();

        assert!(engine.held_mobile().is_none());
        assert!(engine.held_relay().is_none());
        assert!(engine.compose().is_none());
    }

    #[test]
    fn test_forwarded_ttl_is_input_minus_one() {
        for ttl in 2..=i8::MAX {
            let mut engine = RelayEngine::new(NodeId::new(5));
            engine.offer_relay(relay(ttl, 7)).unwrap();
            assert_eq!(engine.compose().unwrap().ttl, ttl - 1);
        }
        for ttl in i8::MIN..=1 {
            let mut engine = RelayEngine::new(NodeId::new(5));
            assert!(engine.offer_relay(relay(ttl, 7)).is_err());
            assert!(engine.compose().is_none());
        }
    }
}
