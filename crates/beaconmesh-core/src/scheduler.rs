//! Duty-cycle scheduler
//!
//! Alternates a node between a Scanning dwell and an Advertising dwell. The
//! scheduler is driven by [`tick`](DutyCycleScheduler::tick) at a fixed
//! period; each tick drains the radio's frame queue, runs the proximity
//! timeout and then checks whether the current dwell has run out.
//!
//! Phase transitions are the only place the radio mode changes. Radio
//! start/stop failures are logged and left for the next transition to retry.

use crate::error::{CoreError, Result};
use crate::proximity::ProximityConfig;
use crate::state::{IndicatorState, NodeState, Phase, Role};
use crate::strategy::{strategy_for, RoleStrategy};
use crate::timing::{DutyCycleTiming, PhaseDwell};
use beaconmesh_network::{
    frame_channel, FrameReceiver, FrameSender, NetworkError, RadioLink, ReceivedFrame,
};
use beaconmesh_protocol::{
    encode_advertisement, Advertisement, AdvertisementCodec, CodecConfig, NodeId,
};
use beaconmesh_routing::RelayStats;
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

/// Everything needed to build one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_id: NodeId,
    pub role: Role,
    #[serde(default)]
    pub timing: DutyCycleTiming,
    #[serde(default)]
    pub proximity: ProximityConfig,
    #[serde(default)]
    pub codec: CodecConfig,
}

impl NodeConfig {
    pub fn new(node_id: NodeId, role: Role) -> Self {
        Self {
            node_id,
            role,
            timing: DutyCycleTiming::default(),
            proximity: ProximityConfig::default(),
            codec: CodecConfig::default(),
        }
    }
}

/// Scheduler counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub transitions: u64,
    pub frames_processed: u64,
    /// Frames drained while advertising
    pub frames_discarded: u64,
    pub decode_errors: u64,
    pub radio_failures: u64,
}

pub struct DutyCycleScheduler<R: RadioLink> {
    node_id: NodeId,
    dwell: PhaseDwell,
    proximity: ProximityConfig,
    codec: AdvertisementCodec,
    strategy: Box<dyn RoleStrategy>,
    state: NodeState,
    radio: R,
    frames: FrameReceiver,
    frame_sink: Option<FrameSender>,
    stats: SchedulerStats,
}

impl<R: RadioLink> DutyCycleScheduler<R> {
    pub fn new(config: NodeConfig, radio: R) -> Self {
        let (frame_sink, frames) = frame_channel();

        DutyCycleScheduler {
            node_id: config.node_id,
            dwell: config.timing.dwell(config.role),
            codec: AdvertisementCodec::new(config.codec),
            strategy: strategy_for(config.role, config.node_id),
            state: NodeState::new(&config.proximity),
            proximity: config.proximity,
            radio,
            frames,
            frame_sink: Some(frame_sink),
            stats: SchedulerStats::default(),
        }
    }

    /// Bring the radio up and enter the first Scanning dwell at `now`
    ///
    /// Failing to enable the radio is the one error a node cannot recover
    /// from.
    pub fn start(&mut self, now: u64) -> Result<()> {
        let sink = self.frame_sink.clone().ok_or(CoreError::AlreadyStarted)?;

        self.radio.enable(sink).map_err(|e| match e {
            NetworkError::RadioUnavailable(reason) => CoreError::RadioUnavailable(reason),
            other => CoreError::RadioUnavailable(other.to_string()),
        })?;
        self.frame_sink = None;

        info!(
            "Node {} started as {} (scan {}, advertise {})",
            self.node_id,
            self.strategy.role(),
            self.dwell.scanning,
            self.dwell.advertising
        );
        self.enter(Phase::Scanning, now);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.frame_sink.is_none()
    }

    /// Advance the node to `now`
    pub fn tick(&mut self, now: u64) {
        if !self.is_started() {
            return;
        }
        self.stats.ticks += 1;

        self.drain_frames(now);
        self.state.proximity.tick(now);

        let current = self.state.phase;
        if self.state.elapsed(now) > self.dwell.of(current) {
            let next = current.next();

            let mut anchor = self.state.phase_started_at + self.dwell.of(current);
            if now.saturating_sub(anchor) > self.dwell.of(next) {
                debug!(
                    "Node {} stalled {} units past its {} dwell",
                    self.node_id,
                    now - anchor,
                    current
                );
                anchor = now;
            }

            if current == Phase::Advertising {
                self.strategy.on_leave_advertising(&mut self.state);
            }
            self.enter(next, anchor);
        }
    }

    /// Feed motion estimates into the next mobile report
    pub fn set_motion(&mut self, speed: i8, direction: i8) {
        self.strategy.set_motion(speed, direction);
    }

    fn drain_frames(&mut self, now: u64) {
        while let Ok(frame) = self.frames.try_recv() {
            if self.state.phase == Phase::Advertising {
                self.stats.frames_discarded += 1;
                continue;
            }
            self.handle_frame(frame, now);
        }
    }

    fn handle_frame(&mut self, frame: ReceivedFrame, now: u64) {
        let advertisement =
            match self
                .codec
                .classify_and_decode(&frame.address, frame.rssi, &frame.data)
            {
                Ok(advertisement) => advertisement,
                Err(e) => {
                    self.stats.decode_errors += 1;
                    trace!("Frame from {} discarded: {}", frame.address, e);
                    return;
                }
            };
        self.stats.frames_processed += 1;

        match advertisement {
            Advertisement::ForeignBeacon(reading) => {
                self.state.beacons.observe(reading.identity, reading.strength);
            }
            Advertisement::MobileReport(report) => {
                if report.mobile_id != self.node_id && self.proximity.tracks(report.mobile_id) {
                    self.state.proximity.update(frame.rssi, now);
                }
                self.strategy
                    .on_mobile_report(&mut self.state, report, now);
            }
            Advertisement::RelayReport(report) => {
                self.strategy.on_relay_report(&mut self.state, report);
            }
            Advertisement::Unrecognized => {}
        }
    }

    fn enter(&mut self, phase: Phase, at: u64) {
        trace!("Node {} entering {} at {}", self.node_id, phase, at);
        self.state.phase = phase;
        self.state.phase_started_at = at;
        self.state.already_corrected = false;
        self.stats.transitions += 1;

        match phase {
            Phase::Scanning => {
                self.radio_op("stop_advertise", |radio| radio.stop_advertise());
                self.strategy.on_enter_scanning(&mut self.state);
                if !self.radio.is_scanning() {
                    self.radio_op("start_scan", |radio| radio.start_scan());
                }
            }
            Phase::Advertising => {
                self.radio_op("stop_scan", |radio| radio.stop_scan());
                match self.strategy.compose(&self.state) {
                    Some(payload) => {
                        let data = encode_advertisement(&payload);
                        if !self.radio.is_advertising() {
                            self.radio_op("start_advertise", |radio| {
                                radio.start_advertise(&data)
                            });
                        }
                    }
                    None => debug!("Node {} has nothing to advertise", self.node_id),
                }
            }
        }
    }

    fn radio_op(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut R) -> beaconmesh_network::Result<()>,
    ) {
        if let Err(e) = f(&mut self.radio) {
            self.stats.radio_failures += 1;
            warn!("Node {} {} failed: {}", self.node_id, op, e);
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn role(&self) -> Role {
        self.strategy.role()
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn is_too_close(&self) -> bool {
        self.state.proximity.is_too_close()
    }

    pub fn indicator(&self) -> IndicatorState {
        IndicatorState::from_node(self.is_too_close(), self.phase())
    }

    pub fn dwell(&self) -> PhaseDwell {
        self.dwell
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Relay engine counters, `None` for mobile nodes
    pub fn relay_stats(&self) -> Option<&RelayStats> {
        self.strategy.relay_stats()
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }
}

impl<R: RadioLink + std::fmt::Debug> std::fmt::Debug for DutyCycleScheduler<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DutyCycleScheduler")
            .field("node_id", &self.node_id)
            .field("role", &self.strategy.role())
            .field("state", &self.state)
            .field("radio", &self.radio)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beaconmesh_network::{AdvKind, RadioStatus};
    use beaconmesh_protocol::{
        encode_name_advertisement, BeaconReading, LinkAddress, MobileReport, Payload, RelayReport,
    };

    #[derive(Debug, Default)]
    struct MockRadio {
        sink: Option<FrameSender>,
        scanning: bool,
        advertising: Option<Vec<u8>>,
        unavailable: bool,
        failing_starts: u32,
        calls: Vec<&'static str>,
    }

    impl MockRadio {
        fn deliver(&self, rssi: i8, data: Vec<u8>) {
            let frame = ReceivedFrame {
                address: "C0:00:00:00:00:02".parse().unwrap(),
                rssi,
                kind: AdvKind::ConnectableUndirected,
                data,
            };
            self.sink.as_ref().unwrap().send(frame).unwrap();
        }

        fn fail_start(&mut self, op: &'static str) -> beaconmesh_network::Result<()> {
            self.calls.push(op);
            if self.failing_starts > 0 {
                self.failing_starts -= 1;
                return Err(NetworkError::op_failed(op, "busy"));
            }
            Ok(())
        }
    }

    impl RadioLink for MockRadio {
        fn enable(&mut self, frames: FrameSender) -> beaconmesh_network::Result<()> {
            if self.unavailable {
                return Err(NetworkError::RadioUnavailable("no controller".into()));
            }
            self.sink = Some(frames);
            Ok(())
        }

        fn start_scan(&mut self) -> beaconmesh_network::Result<()> {
            self.fail_start("start_scan")?;
            self.scanning = true;
            Ok(())
        }

        fn stop_scan(&mut self) -> beaconmesh_network::Result<()> {
            self.calls.push("stop_scan");
            self.scanning = false;
            Ok(())
        }

        fn start_advertise(&mut self, data: &[u8]) -> beaconmesh_network::Result<()> {
            self.fail_start("start_advertise")?;
            self.advertising = Some(data.to_vec());
            Ok(())
        }

        fn stop_advertise(&mut self) -> beaconmesh_network::Result<()> {
            self.calls.push("stop_advertise");
            self.advertising = None;
            Ok(())
        }

        fn is_scanning(&self) -> bool {
            self.scanning
        }

        fn is_advertising(&self) -> bool {
            self.advertising.is_some()
        }

        fn status(&self) -> RadioStatus {
            RadioStatus::Idle
        }

        fn local_address(&self) -> LinkAddress {
            LinkAddress::default()
        }
    }

    fn node(id: u8, role: Role) -> DutyCycleScheduler<MockRadio> {
        DutyCycleScheduler::new(NodeConfig::new(NodeId::new(id), role), MockRadio::default())
    }

    fn mobile_frame(id: u8) -> Vec<u8> {
        encode_advertisement(&Payload::Mobile(MobileReport::new(
            NodeId::new(id),
            [BeaconReading::new(b'A', -70); 3],
            0,
            0,
        )))
    }

    fn advertised(node: &DutyCycleScheduler<MockRadio>) -> Option<Advertisement> {
        let data = node.radio().advertising.as_ref()?;
        AdvertisementCodec::default()
            .classify_and_decode(&LinkAddress::default(), 0, data)
            .ok()
    }

    #[test]
    fn test_mobile_phase_timing_every_unit() {
        let mut node = node(1, Role::Mobile);
        node.start(0).unwrap();

        for t in 1..=1000u64 {
            node.tick(t);
            let in_cycle = t % 250;
            let expected = if in_cycle > 200 || in_cycle == 0 {
                Phase::Advertising
            } else {
                Phase::Scanning
            };
            assert_eq!(node.phase(), expected, "t = {}", t);
        }
    }

    #[test]
    fn test_relay_phase_timing_at_tick_period() {
        let mut node = node(5, Role::Relay);
        node.start(0).unwrap();

        let mut phases = Vec::new();
        for t in (50..=1000u64).step_by(50) {
            node.tick(t);
            phases.push((t, node.phase()));
        }

        assert!(phases.contains(&(400, Phase::Scanning)));
        assert!(phases.contains(&(450, Phase::Advertising)));
        assert!(phases.contains(&(500, Phase::Advertising)));
        assert!(phases.contains(&(550, Phase::Scanning)));
        assert!(phases.contains(&(900, Phase::Scanning)));
        assert!(phases.contains(&(950, Phase::Advertising)));
        assert!(phases.contains(&(1000, Phase::Advertising)));
    }

    #[test]
    fn test_start_fails_when_radio_unavailable() {
        let radio = MockRadio {
            unavailable: true,
            ..Default::default()
        };
        let mut node = DutyCycleScheduler::new(NodeConfig::new(NodeId::new(1), Role::Mobile), radio);

        assert!(matches!(node.start(0), Err(CoreError::RadioUnavailable(_))));
        assert!(!node.is_started());

        // Ticking an unstarted node does nothing
        node.tick(1000);
        assert_eq!(node.stats().ticks, 0);
    }

    #[test]
    fn test_start_twice_rejected() {
        let mut node = node(1, Role::Mobile);
        node.start(0).unwrap();
        assert_eq!(node.start(10), Err(CoreError::AlreadyStarted));
    }

    #[test]
    fn test_radio_failure_retried_at_next_transition() {
        let radio = MockRadio {
            failing_starts: 1,
            ..Default::default()
        };
        let mut node = DutyCycleScheduler::new(NodeConfig::new(NodeId::new(1), Role::Mobile), radio);
        node.start(0).unwrap();

        assert_eq!(node.phase(), Phase::Scanning);
        assert!(!node.radio().scanning);
        assert_eq!(node.stats().radio_failures, 1);

        node.tick(250);
        assert_eq!(node.phase(), Phase::Advertising);
        assert!(node.radio().advertising.is_some());

        node.tick(300);
        assert_eq!(node.phase(), Phase::Scanning);
        assert!(node.radio().scanning);
        assert!(node.radio().advertising.is_none());
    }

    #[test]
    fn test_mobile_advertises_beacon_table() {
        let mut node = node(1, Role::Mobile);
        node.start(0).unwrap();
        node.set_motion(4, 2);

        node.radio().deliver(-72, encode_name_advertisement("BCN--P").unwrap());
        node.tick(50);
        node.tick(250);

        match advertised(&node) {
            Some(Advertisement::MobileReport(report)) => {
                assert_eq!(report.mobile_id, NodeId::new(1));
                assert_eq!(report.beacons[0], BeaconReading::new(b'P', -72));
                assert_eq!(report.speed, 4);
                assert_eq!(report.direction, 2);
            }
            other => panic!("unexpected advertisement {:?}", other),
        }
    }

    #[test]
    fn test_frames_discarded_while_advertising() {
        let mut node = node(1, Role::Mobile);
        node.start(0).unwrap();
        node.tick(250);
        assert_eq!(node.phase(), Phase::Advertising);

        node.radio().deliver(-60, encode_name_advertisement("BCN--P").unwrap());
        node.tick(280);

        assert!(node.state().beacons.is_empty());
        assert_eq!(node.stats().frames_discarded, 1);
    }

    #[test]
    fn test_mobile_aligns_to_peer_once() {
        let mut node = node(1, Role::Mobile);
        node.start(0).unwrap();

        node.radio().deliver(-80, mobile_frame(2));
        node.tick(100);
        assert_eq!(node.state().phase_started_at, 100);

        node.radio().deliver(-80, mobile_frame(3));
        node.tick(150);
        assert_eq!(node.state().phase_started_at, 100);

        node.tick(300);
        assert_eq!(node.phase(), Phase::Scanning);
        node.tick(350);
        assert_eq!(node.phase(), Phase::Advertising);
        assert_eq!(node.state().phase_started_at, 300);
    }

    #[test]
    fn test_proximity_latch_from_peer_report() {
        let mut node = node(1, Role::Mobile);
        node.start(0).unwrap();

        node.radio().deliver(-40, mobile_frame(2));
        node.tick(0);
        assert!(node.is_too_close());
        assert_eq!(node.indicator(), IndicatorState::Steady);

        for t in (50..=1500u64).step_by(50) {
            node.tick(t);
            assert!(node.is_too_close(), "cleared at {}", t);
        }
        node.tick(1550);
        assert!(!node.is_too_close());
    }

    #[test]
    fn test_relay_forwards_decremented_report() {
        let mut node = node(5, Role::Relay);
        node.start(0).unwrap();

        let report = RelayReport {
            ttl: 3,
            origin_id: NodeId::new(7),
            payload: MobileReport::new(NodeId::new(2), [BeaconReading::empty(); 3], 0, 1),
        };
        node.radio()
            .deliver(-70, encode_advertisement(&Payload::Relay(report)));
        node.tick(50);
        node.tick(450);
        assert_eq!(node.phase(), Phase::Advertising);

        match advertised(&node) {
            Some(Advertisement::RelayReport(out)) => {
                assert_eq!(out.ttl, 2);
                assert_eq!(out.origin_id, NodeId::new(7));
                assert_eq!(out.payload, report.payload);
            }
            other => panic!("unexpected advertisement {:?}", other),
        }

        // Consumed once: the next cycle has nothing to send
        node.tick(550);
        assert_eq!(node.phase(), Phase::Scanning);
        node.tick(950);
        assert_eq!(node.phase(), Phase::Advertising);
        assert!(node.radio().advertising.is_none());
        assert_eq!(node.relay_stats().map(|s| s.forwarded), Some(1));
    }

    #[test]
    fn test_relay_drops_expired_report() {
        let mut node = node(5, Role::Relay);
        node.start(0).unwrap();

        let report = RelayReport {
            ttl: 1,
            origin_id: NodeId::new(9),
            payload: MobileReport::new(NodeId::new(2), [BeaconReading::empty(); 3], 0, 0),
        };
        node.radio()
            .deliver(-70, encode_advertisement(&Payload::Relay(report)));
        node.tick(450);

        assert_eq!(node.phase(), Phase::Advertising);
        assert!(node.radio().advertising.is_none());
        assert_eq!(node.relay_stats().map(|s| s.dropped_ttl), Some(1));
    }

    #[test]
    fn test_relay_wraps_mobile_report() {
        let mut node = node(5, Role::Relay);
        node.start(0).unwrap();
        assert!(node.state().alternate_for_mobile);

        node.radio().deliver(-65, mobile_frame(2));
        node.tick(450);

        match advertised(&node) {
            Some(Advertisement::RelayReport(out)) => {
                assert_eq!(out.ttl, 4);
                assert_eq!(out.origin_id, NodeId::new(5));
                assert_eq!(out.payload.mobile_id, NodeId::new(2));
            }
            other => panic!("unexpected advertisement {:?}", other),
        }
    }

    #[test]
    fn test_stall_anchors_to_now() {
        let mut node = node(1, Role::Mobile);
        node.start(0).unwrap();

        node.tick(1000);
        assert_eq!(node.phase(), Phase::Advertising);
        assert_eq!(node.state().phase_started_at, 1000);
    }

    #[test]
    fn test_malformed_frames_counted() {
        let mut node = node(1, Role::Mobile);
        node.start(0).unwrap();

        node.radio().deliver(-60, vec![5, 0x42, 1]);
        node.radio().deliver(-60, vec![3, 0x42, 1, 2]);
        node.tick(50);

        assert_eq!(node.stats().decode_errors, 2);
        assert_eq!(node.stats().frames_processed, 0);
    }
}
