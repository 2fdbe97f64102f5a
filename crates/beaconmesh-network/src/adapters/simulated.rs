//! Simulated radio medium
//!
//! An in-process "air" shared by any number of simulated radios and fixed
//! beacons. It models:
//!
//! - Radios and beacons with configurable 2D positions
//! - Log-distance path loss from a measured power at the reference distance
//! - A receiver sensitivity floor below which frames are not heard
//! - Half-duplex radios: only radios that are scanning hear anything
//!
//! Each call to [`SimulatedAir::step`] is one advertising event: every
//! advertising radio and every beacon is heard once by every scanning radio
//! in range.

use crate::adapter::{AdvKind, FrameSender, RadioLink, RadioStatus, ReceivedFrame};
use crate::error::{NetworkError, Result};
use crate::metrics::RadioMetrics;
use beaconmesh_protocol::frame::{encode_name_advertisement, MAX_ADV_DATA_SIZE};
use beaconmesh_protocol::LinkAddress;
use dashmap::DashMap;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Position in 2D space (meters)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Distance to another position in meters
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Propagation model parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationConfig {
    /// RSSI measured at the reference distance (dBm)
    pub measured_power_dbm: f64,
    /// Path loss exponent (2.0 = free space, 3.0-4.0 = cluttered indoor)
    pub path_loss_exponent: f64,
    /// Reference distance for the measured power (meters)
    pub reference_distance: f64,
    /// Weakest signal a receiver can decode (dBm)
    pub rx_sensitivity_dbm: f64,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            measured_power_dbm: -59.0,
            path_loss_exponent: 2.0,
            reference_distance: 1.0,
            rx_sensitivity_dbm: -100.0,
        }
    }
}

impl PropagationConfig {
    pub fn with_path_loss_exponent(mut self, exponent: f64) -> Self {
        self.path_loss_exponent = exponent;
        self
    }

    pub fn with_sensitivity(mut self, dbm: f64) -> Self {
        self.rx_sensitivity_dbm = dbm;
        self
    }

    /// Expected RSSI at `distance` meters
    pub fn rssi_at(&self, distance: f64) -> f64 {
        let distance = distance.max(self.reference_distance);
        self.measured_power_dbm
            - 10.0 * self.path_loss_exponent * (distance / self.reference_distance).log10()
    }
}

#[derive(Debug)]
struct RadioSlot {
    position: Position,
    powered: bool,
    sink: Option<FrameSender>,
    scanning: bool,
    advertising: Option<Vec<u8>>,
    pending_failures: u32,
    metrics: RadioMetrics,
}

#[derive(Debug, Clone)]
struct FixedBeacon {
    position: Position,
    data: Vec<u8>,
}

#[derive(Debug)]
struct AirInner {
    config: PropagationConfig,
    radios: DashMap<LinkAddress, RadioSlot>,
    beacons: DashMap<LinkAddress, FixedBeacon>,
}

/// Shared medium; cheap to clone, all clones see the same air
#[derive(Debug, Clone)]
pub struct SimulatedAir {
    inner: Arc<AirInner>,
}

impl SimulatedAir {
    pub fn new(config: PropagationConfig) -> Self {
        Self {
            inner: Arc::new(AirInner {
                config,
                radios: DashMap::new(),
                beacons: DashMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &PropagationConfig {
        &self.inner.config
    }

    /// Attach a new radio at `position`
    pub fn attach(&self, address: LinkAddress, position: Position) -> Result<SimulatedRadio> {
        if self.inner.radios.contains_key(&address) || self.inner.beacons.contains_key(&address) {
            return Err(NetworkError::AddressInUse(address.to_string()));
        }

        self.inner.radios.insert(
            address,
            RadioSlot {
                position,
                powered: true,
                sink: None,
                scanning: false,
                advertising: None,
                pending_failures: 0,
                metrics: RadioMetrics::new(),
            },
        );
        debug!("Radio {} attached at ({:.1}, {:.1})", address, position.x, position.y);

        Ok(SimulatedRadio {
            address,
            air: self.clone(),
        })
    }

    /// Place a fixed beacon that continuously advertises `name`
    pub fn add_beacon(&self, address: LinkAddress, position: Position, name: &str) -> Result<()> {
        if self.inner.radios.contains_key(&address) || self.inner.beacons.contains_key(&address) {
            return Err(NetworkError::AddressInUse(address.to_string()));
        }

        let data = encode_name_advertisement(name)?;
        self.inner.beacons.insert(address, FixedBeacon { position, data });
        debug!("Beacon {} ({}) placed at ({:.1}, {:.1})", name, address, position.x, position.y);
        Ok(())
    }

    /// Move a radio or beacon
    pub fn move_to(&self, address: &LinkAddress, position: Position) -> bool {
        if let Some(mut slot) = self.inner.radios.get_mut(address) {
            slot.position = position;
            return true;
        }
        if let Some(mut beacon) = self.inner.beacons.get_mut(address) {
            beacon.position = position;
            return true;
        }
        false
    }

    /// Power a radio down (or back up). A powered-down radio cannot be
    /// enabled and stops whatever it was doing.
    pub fn set_powered(&self, address: &LinkAddress, powered: bool) {
        if let Some(mut slot) = self.inner.radios.get_mut(address) {
            slot.powered = powered;
            if !powered {
                slot.sink = None;
                slot.scanning = false;
                slot.advertising = None;
            }
        }
    }

    /// Make the next `count` start operations on a radio fail
    pub fn inject_failures(&self, address: &LinkAddress, count: u32) {
        if let Some(mut slot) = self.inner.radios.get_mut(address) {
            slot.pending_failures = count;
        }
    }

    pub fn metrics(&self, address: &LinkAddress) -> Option<RadioMetrics> {
        self.inner.radios.get(address).map(|slot| slot.metrics.clone())
    }

    pub fn radio_count(&self) -> usize {
        self.inner.radios.len()
    }

    pub fn beacon_count(&self) -> usize {
        self.inner.beacons.len()
    }

    /// Run one advertising event; returns the number of frames delivered
    pub fn step(&self) -> usize {
        let config = &self.inner.config;

        let mut transmitters: Vec<(LinkAddress, Position, Vec<u8>, AdvKind)> = self
            .inner
            .radios
            .iter()
            .filter_map(|entry| {
                entry.advertising.as_ref().map(|data| {
                    (
                        *entry.key(),
                        entry.position,
                        data.clone(),
                        AdvKind::ConnectableUndirected,
                    )
                })
            })
            .collect();
        let radio_transmitters = transmitters.len();

        transmitters.extend(self.inner.beacons.iter().map(|entry| {
            (
                *entry.key(),
                entry.position,
                entry.data.clone(),
                AdvKind::NonConnectableUndirected,
            )
        }));

        for (address, ..) in &transmitters[..radio_transmitters] {
            if let Some(mut slot) = self.inner.radios.get_mut(address) {
                slot.metrics.record_send();
            }
        }

        let mut delivered = 0;
        for mut entry in self.inner.radios.iter_mut() {
            let rx_address = *entry.key();
            let slot = entry.value_mut();
            if !slot.scanning {
                continue;
            }

            for (tx_address, tx_position, data, kind) in &transmitters {
                if *tx_address == rx_address {
                    continue;
                }

                let rssi = config.rssi_at(slot.position.distance_to(tx_position));
                if rssi < config.rx_sensitivity_dbm {
                    continue;
                }

                let frame = ReceivedFrame {
                    address: *tx_address,
                    rssi: rssi.round().clamp(i8::MIN as f64, i8::MAX as f64) as i8,
                    kind: *kind,
                    data: data.clone(),
                };

                let sent = slot.sink.as_ref().map(|sink| sink.send(frame).is_ok());
                if sent == Some(true) {
                    slot.metrics.record_receive(data.len());
                    delivered += 1;
                } else {
                    slot.metrics.record_drop();
                }
            }
        }

        trace!(
            "Air step: {} transmitters, {} frames delivered",
            transmitters.len(),
            delivered
        );
        delivered
    }
}

/// A radio attached to a [`SimulatedAir`]
#[derive(Debug)]
pub struct SimulatedRadio {
    address: LinkAddress,
    air: SimulatedAir,
}

impl SimulatedRadio {
    pub fn air(&self) -> &SimulatedAir {
        &self.air
    }

    fn with_slot<R>(&self, f: impl FnOnce(&mut RadioSlot) -> Result<R>) -> Result<R> {
        let mut slot = self
            .air
            .inner
            .radios
            .get_mut(&self.address)
            .ok_or_else(|| NetworkError::RadioUnavailable(self.address.to_string()))?;
        f(slot.value_mut())
    }

    fn check_ready(slot: &mut RadioSlot, op: &'static str) -> Result<()> {
        if slot.sink.is_none() {
            return Err(NetworkError::RadioNotEnabled);
        }
        if slot.pending_failures > 0 {
            slot.pending_failures -= 1;
            slot.metrics.record_op_failure();
            return Err(NetworkError::op_failed(op, "injected fault"));
        }
        Ok(())
    }
}

impl RadioLink for SimulatedRadio {
    fn enable(&mut self, frames: FrameSender) -> Result<()> {
        let address = self.address;
        self.with_slot(|slot| {
            if !slot.powered {
                return Err(NetworkError::RadioUnavailable(format!(
                    "{} is powered down",
                    address
                )));
            }
            slot.sink = Some(frames);
            Ok(())
        })
    }

    fn start_scan(&mut self) -> Result<()> {
        self.with_slot(|slot| {
            if slot.scanning {
                return Ok(());
            }
            Self::check_ready(slot, "start_scan")?;
            slot.scanning = true;
            slot.metrics.scans_started += 1;
            Ok(())
        })
    }

    fn stop_scan(&mut self) -> Result<()> {
        self.with_slot(|slot| {
            slot.scanning = false;
            Ok(())
        })
    }

    fn start_advertise(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > MAX_ADV_DATA_SIZE {
            return Err(NetworkError::PayloadTooLarge {
                size: data.len(),
                max: MAX_ADV_DATA_SIZE,
            });
        }

        self.with_slot(|slot| {
            if slot.advertising.is_some() {
                warn!("start_advertise while already advertising, replacing data");
                slot.advertising = Some(data.to_vec());
                return Ok(());
            }
            Self::check_ready(slot, "start_advertise")?;
            slot.advertising = Some(data.to_vec());
            slot.metrics.adverts_started += 1;
            Ok(())
        })
    }

    fn stop_advertise(&mut self) -> Result<()> {
        self.with_slot(|slot| {
            slot.advertising = None;
            Ok(())
        })
    }

    fn is_scanning(&self) -> bool {
        self.air
            .inner
            .radios
            .get(&self.address)
            .map(|slot| slot.scanning)
            .unwrap_or(false)
    }

    fn is_advertising(&self) -> bool {
        self.air
            .inner
            .radios
            .get(&self.address)
            .map(|slot| slot.advertising.is_some())
            .unwrap_or(false)
    }

    fn status(&self) -> RadioStatus {
        match self.air.inner.radios.get(&self.address) {
            None => RadioStatus::Unavailable,
            Some(slot) if !slot.powered => RadioStatus::Unavailable,
            Some(slot) if slot.sink.is_none() => RadioStatus::Uninitialized,
            Some(slot) if slot.advertising.is_some() => RadioStatus::Advertising,
            Some(slot) if slot.scanning => RadioStatus::Scanning,
            Some(_) => RadioStatus::Idle,
        }
    }

    fn local_address(&self) -> LinkAddress {
        self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::frame_channel;

    fn addr(last: u8) -> LinkAddress {
        LinkAddress::from_bytes([0xC0, 0, 0, 0, 0, last])
    }

    #[test]
    fn test_position_distance() {
        let p1 = Position::new(0.0, 0.0);
        let p2 = Position::new(3.0, 4.0);
        assert!((p1.distance_to(&p2) - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_rssi_model() {
        let config = PropagationConfig::default();
        assert_eq!(config.rssi_at(1.0), -59.0);
        assert_eq!(config.rssi_at(0.2), -59.0);
        assert!((config.rssi_at(10.0) - -79.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let air = SimulatedAir::new(PropagationConfig::default());
        let _radio = air.attach(addr(1), Position::default()).unwrap();
        assert!(matches!(
            air.attach(addr(1), Position::default()),
            Err(NetworkError::AddressInUse(_))
        ));
        assert!(air.add_beacon(addr(1), Position::default(), "BCN--A").is_err());
    }

    #[tokio::test]
    async fn test_scanning_radio_hears_advertiser() {
        let air = SimulatedAir::new(PropagationConfig::default());
        let mut tx = air.attach(addr(1), Position::new(0.0, 0.0)).unwrap();
        let mut rx = air.attach(addr(2), Position::new(10.0, 0.0)).unwrap();

        let (tx_sink, _tx_frames) = frame_channel();
        let (rx_sink, mut rx_frames) = frame_channel();
        tx.enable(tx_sink).unwrap();
        rx.enable(rx_sink).unwrap();

        tx.start_advertise(&[0x02, 0x01, 0x06]).unwrap();
        rx.start_scan().unwrap();
        assert_eq!(air.step(), 1);

        let frame = rx_frames.try_recv().unwrap();
        assert_eq!(frame.address, addr(1));
        assert_eq!(frame.rssi, -79);
        assert_eq!(frame.kind, AdvKind::ConnectableUndirected);
        assert_eq!(frame.data, vec![0x02, 0x01, 0x06]);

        assert_eq!(air.metrics(&addr(1)).unwrap().frames_sent, 1);
        assert_eq!(air.metrics(&addr(2)).unwrap().frames_received, 1);
    }

    #[tokio::test]
    async fn test_half_duplex_and_range() {
        let air = SimulatedAir::new(PropagationConfig::default().with_sensitivity(-80.0));
        let mut near = air.attach(addr(1), Position::new(0.0, 0.0)).unwrap();
        let (sink, mut frames) = frame_channel();
        near.enable(sink).unwrap();

        air.add_beacon(addr(9), Position::new(5.0, 0.0), "BCN--A").unwrap();
        air.add_beacon(addr(10), Position::new(500.0, 0.0), "BCN--B").unwrap();

        // Not scanning: nothing delivered
        assert_eq!(air.step(), 0);

        near.start_scan().unwrap();
        assert_eq!(air.step(), 1);
        let frame = frames.try_recv().unwrap();
        assert_eq!(frame.address, addr(9));
        assert_eq!(frame.kind, AdvKind::NonConnectableUndirected);
        assert!(frames.try_recv().is_err());
    }

    #[test]
    fn test_operations_idempotent() {
        let air = SimulatedAir::new(PropagationConfig::default());
        let mut radio = air.attach(addr(1), Position::default()).unwrap();
        let (sink, _frames) = frame_channel();
        radio.enable(sink).unwrap();

        radio.start_scan().unwrap();
        radio.start_scan().unwrap();
        assert_eq!(air.metrics(&addr(1)).unwrap().scans_started, 1);
        assert_eq!(radio.status(), RadioStatus::Scanning);

        radio.stop_scan().unwrap();
        radio.stop_scan().unwrap();
        radio.stop_advertise().unwrap();
        assert_eq!(radio.status(), RadioStatus::Idle);
    }

    #[test]
    fn test_not_enabled_and_powered_down() {
        let air = SimulatedAir::new(PropagationConfig::default());
        let mut radio = air.attach(addr(1), Position::default()).unwrap();
        assert_eq!(radio.start_scan(), Err(NetworkError::RadioNotEnabled));
        assert_eq!(radio.status(), RadioStatus::Uninitialized);

        air.set_powered(&addr(1), false);
        let (sink, _frames) = frame_channel();
        assert!(matches!(
            radio.enable(sink),
            Err(NetworkError::RadioUnavailable(_))
        ));
        assert_eq!(radio.status(), RadioStatus::Unavailable);
    }

    #[test]
    fn test_injected_failures() {
        let air = SimulatedAir::new(PropagationConfig::default());
        let mut radio = air.attach(addr(1), Position::default()).unwrap();
        let (sink, _frames) = frame_channel();
        radio.enable(sink).unwrap();

        air.inject_failures(&addr(1), 1);
        assert!(matches!(
            radio.start_advertise(&[1, 2, 3]),
            Err(NetworkError::RadioOpFailed { op: "start_advertise", .. })
        ));
        assert!(radio.start_advertise(&[1, 2, 3]).is_ok());
        assert_eq!(air.metrics(&addr(1)).unwrap().op_failures, 1);

        assert!(matches!(
            radio.start_advertise(&[0u8; 40]),
            Err(NetworkError::PayloadTooLarge { size: 40, .. })
        ));
    }

    #[tokio::test]
    async fn test_closed_queue_counts_drop() {
        let air = SimulatedAir::new(PropagationConfig::default());
        let mut radio = air.attach(addr(1), Position::default()).unwrap();
        let (sink, frames) = frame_channel();
        radio.enable(sink).unwrap();
        radio.start_scan().unwrap();
        drop(frames);

        air.add_beacon(addr(2), Position::new(1.0, 0.0), "BCN--A").unwrap();
        assert_eq!(air.step(), 0);
        assert_eq!(air.metrics(&addr(1)).unwrap().frames_dropped, 1);
    }
}
