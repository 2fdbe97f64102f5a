//! Role strategies
//!
//! The scheduler owns the phase clock and the radio; a strategy decides what
//! a role does with decoded reports and what it advertises.

use crate::state::{NodeState, Role};
use beaconmesh_protocol::types::clamp_direction;
use beaconmesh_protocol::{MobileReport, NodeId, Payload, RelayReport};
use beaconmesh_routing::{RelayEngine, RelayStats};
use log::{debug, trace};

/// Role-specific behavior plugged into the scheduler
pub trait RoleStrategy: Send + std::fmt::Debug {
    fn role(&self) -> Role;

    /// Called on every Scanning entry, including the first
    fn on_enter_scanning(&mut self, state: &mut NodeState);

    /// A mobile report heard while scanning
    fn on_mobile_report(&mut self, state: &mut NodeState, report: MobileReport, now: u64);

    /// A relay report heard while scanning
    fn on_relay_report(&mut self, state: &mut NodeState, report: RelayReport);

    /// Payload for the advertising dwell that is starting
    fn compose(&mut self, state: &NodeState) -> Option<Payload>;

    /// Called when the advertising dwell ends
    fn on_leave_advertising(&mut self, state: &mut NodeState);

    /// Feed motion estimates; ignored by roles that do not move
    fn set_motion(&mut self, _speed: i8, _direction: i8) {}

    fn relay_stats(&self) -> Option<&RelayStats> {
        None
    }
}

/// Build the strategy for `role`
pub fn strategy_for(role: Role, node_id: NodeId) -> Box<dyn RoleStrategy> {
    match role {
        Role::Mobile => Box::new(MobileStrategy::new(node_id)),
        Role::Relay => Box::new(RelayStrategy::new(node_id)),
    }
}

/// Mobile tag: advertise the beacon table and motion estimate
#[derive(Debug, Clone)]
pub struct MobileStrategy {
    node_id: NodeId,
    speed: i8,
    direction: i8,
}

impl MobileStrategy {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            speed: 0,
            direction: 0,
        }
    }
}

impl RoleStrategy for MobileStrategy {
    fn role(&self) -> Role {
        Role::Mobile
    }

    fn on_enter_scanning(&mut self, _state: &mut NodeState) {}

    fn on_mobile_report(&mut self, state: &mut NodeState, report: MobileReport, now: u64) {
        if report.mobile_id == self.node_id || state.already_corrected {
            return;
        }

        // Restart the dwell so our next advertising slot lines up with the peer
        debug!(
            "Aligning scan dwell to mobile {} at {} (was started at {})",
            report.mobile_id, now, state.phase_started_at
        );
        state.phase_started_at = now;
        state.already_corrected = true;
    }

    fn on_relay_report(&mut self, _state: &mut NodeState, report: RelayReport) {
        trace!("Mobile ignoring relay report from {}", report.origin_id);
    }

    fn compose(&mut self, state: &NodeState) -> Option<Payload> {
        Some(Payload::Mobile(MobileReport::new(
            self.node_id,
            state.beacons.snapshot(),
            self.speed,
            self.direction,
        )))
    }

    fn on_leave_advertising(&mut self, _state: &mut NodeState) {}

    fn set_motion(&mut self, speed: i8, direction: i8) {
        self.speed = speed;
        self.direction = clamp_direction(direction);
    }
}

/// Relay node: capture reports and re-flood one per cycle
#[derive(Debug, Clone)]
pub struct RelayStrategy {
    engine: RelayEngine,
}

impl RelayStrategy {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            engine: RelayEngine::new(node_id),
        }
    }

    pub fn engine(&self) -> &RelayEngine {
        &self.engine
    }
}

impl RoleStrategy for RelayStrategy {
    fn role(&self) -> Role {
        Role::Relay
    }

    fn on_enter_scanning(&mut self, state: &mut NodeState) {
        state.alternate_for_mobile = !state.alternate_for_mobile;
    }

    fn on_mobile_report(&mut self, state: &mut NodeState, report: MobileReport, _now: u64) {
        if state.alternate_for_mobile {
            self.engine.offer_mobile(report);
        } else {
            trace!(
                "Relay {} not capturing mobile reports this dwell",
                self.engine.node_id()
            );
        }
    }

    fn on_relay_report(&mut self, _state: &mut NodeState, report: RelayReport) {
        if let Err(e) = self.engine.offer_relay(report) {
            debug!("Relay report from {} discarded: {}", report.origin_id, e);
        }
    }

    fn compose(&mut self, _state: &NodeState) -> Option<Payload> {
        self.engine.compose().map(Payload::Relay)
    }

    fn on_leave_advertising(&mut self, _state: &mut NodeState) {
        self.engine.clear();
    }

    fn relay_stats(&self) -> Option<&RelayStats> {
        Some(self.engine.stats())
    }
}
