//! Report records exchanged between nodes
//!
//! Both records are fixed size and carried as the body of a vendor-specific
//! advertising element whose AD type doubles as the record tag:
//!
//! MobileReport (9 bytes):
//! - mobile_id (u8)
//! - 3 x (beacon identity u8, beacon rssi i8)
//! - speed (i8)
//! - direction (i8, compass quadrant 0-3)
//!
//! RelayReport (11 bytes):
//! - ttl (i8)
//! - origin_id (u8)
//! - embedded MobileReport (9 bytes)

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::types::{BeaconReading, NodeId};

/// Number of beacon readings carried per mobile report
pub const BEACONS_PER_REPORT: usize = 3;

/// Encoded size of a MobileReport
pub const MOBILE_REPORT_SIZE: usize = 1 + BEACONS_PER_REPORT * 2 + 2;

/// Encoded size of a RelayReport
pub const RELAY_REPORT_SIZE: usize = 2 + MOBILE_REPORT_SIZE;

/// TTL given to a relay report when it is first created
pub const INITIAL_RELAY_TTL: i8 = 4;

/// Record tag carried in the AD type byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReportTag {
    /// Report produced by a mobile tag (0x42)
    Mobile = 0x42,
    /// Report flooded by relay nodes (0x43)
    Relay = 0x43,
}

impl ReportTag {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x42 => Some(ReportTag::Mobile),
            0x43 => Some(ReportTag::Relay),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Encoded size of the record this tag introduces
    pub fn record_size(self) -> usize {
        match self {
            ReportTag::Mobile => MOBILE_REPORT_SIZE,
            ReportTag::Relay => RELAY_REPORT_SIZE,
        }
    }
}

/// A mobile tag's view of its nearest beacons plus motion estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MobileReport {
    pub mobile_id: NodeId,
    pub beacons: [BeaconReading; BEACONS_PER_REPORT],
    pub speed: i8,
    pub direction: i8,
}

impl MobileReport {
    pub fn new(
        mobile_id: NodeId,
        beacons: [BeaconReading; BEACONS_PER_REPORT],
        speed: i8,
        direction: i8,
    ) -> Self {
        MobileReport {
            mobile_id,
            beacons,
            speed,
            direction,
        }
    }

    pub fn to_bytes(&self) -> [u8; MOBILE_REPORT_SIZE] {
        let mut bytes = [0u8; MOBILE_REPORT_SIZE];
        bytes[0] = self.mobile_id.as_u8();
        for (i, reading) in self.beacons.iter().enumerate() {
            bytes[1 + i * 2] = reading.identity;
            bytes[2 + i * 2] = reading.strength as u8;
        }
        bytes[MOBILE_REPORT_SIZE - 2] = self.speed as u8;
        bytes[MOBILE_REPORT_SIZE - 1] = self.direction as u8;
        bytes
    }

    /// Decode from the start of `bytes`; trailing bytes are ignored
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MOBILE_REPORT_SIZE {
            return Err(ProtocolError::DecodeTooShort {
                tag: ReportTag::Mobile.to_u8(),
                expected: MOBILE_REPORT_SIZE,
                actual: bytes.len(),
            });
        }

        let mut beacons = [BeaconReading::empty(); BEACONS_PER_REPORT];
        for (i, reading) in beacons.iter_mut().enumerate() {
            *reading = BeaconReading::new(bytes[1 + i * 2], bytes[2 + i * 2] as i8);
        }

        Ok(MobileReport {
            mobile_id: NodeId::new(bytes[0]),
            beacons,
            speed: bytes[MOBILE_REPORT_SIZE - 2] as i8,
            direction: bytes[MOBILE_REPORT_SIZE - 1] as i8,
        })
    }
}

/// A mobile report in flight through the relay mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayReport {
    pub ttl: i8,
    pub origin_id: NodeId,
    pub payload: MobileReport,
}

impl RelayReport {
    /// Wrap a freshly observed mobile report
    pub fn originate(origin_id: NodeId, payload: MobileReport) -> Self {
        RelayReport {
            ttl: INITIAL_RELAY_TTL,
            origin_id,
            payload,
        }
    }

    /// Whether `node` may forward this report: it must not have come from
    /// `node` itself and must have hops left after this one.
    pub fn is_forwardable_by(&self, node: NodeId) -> bool {
        self.origin_id != node && self.ttl > 1
    }

    pub fn to_bytes(&self) -> [u8; RELAY_REPORT_SIZE] {
        let mut bytes = [0u8; RELAY_REPORT_SIZE];
        bytes[0] = self.ttl as u8;
        bytes[1] = self.origin_id.as_u8();
        bytes[2..].copy_from_slice(&self.payload.to_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RELAY_REPORT_SIZE {
            return Err(ProtocolError::DecodeTooShort {
                tag: ReportTag::Relay.to_u8(),
                expected: RELAY_REPORT_SIZE,
                actual: bytes.len(),
            });
        }

        Ok(RelayReport {
            ttl: bytes[0] as i8,
            origin_id: NodeId::new(bytes[1]),
            payload: MobileReport::from_bytes(&bytes[2..])?,
        })
    }
}

/// Outgoing advertisement body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Mobile(MobileReport),
    Relay(RelayReport),
}

impl Payload {
    pub fn tag(&self) -> ReportTag {
        match self {
            Payload::Mobile(_) => ReportTag::Mobile,
            Payload::Relay(_) => ReportTag::Relay,
        }
    }

    pub fn record_bytes(&self) -> Vec<u8> {
        match self {
            Payload::Mobile(report) => report.to_bytes().to_vec(),
            Payload::Relay(report) => report.to_bytes().to_vec(),
        }
    }
}
