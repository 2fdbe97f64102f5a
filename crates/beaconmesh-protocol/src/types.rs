//! Core protocol types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Size of a link-layer address in bytes
pub const ADDRESS_SIZE: usize = 6;

/// Number of trailing address octets used to resolve vendor beacons
pub const ADDRESS_SUFFIX_SIZE: usize = 3;

/// Identity value marking an unused beacon slot
pub const EMPTY_IDENTITY: u8 = 0;

/// Identifier of a mesh node (mobile tag or relay)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u8);

impl NodeId {
    pub const fn new(id: u8) -> Self {
        NodeId(id)
    }

    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One beacon observation: a single-character identity and its RSSI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BeaconReading {
    /// ASCII identity character, `EMPTY_IDENTITY` for an unused slot
    pub identity: u8,
    /// Received signal strength (dBm)
    pub strength: i8,
}

impl BeaconReading {
    pub fn new(identity: u8, strength: i8) -> Self {
        BeaconReading { identity, strength }
    }

    /// An unused slot
    pub fn empty() -> Self {
        BeaconReading::default()
    }

    pub fn is_empty(&self) -> bool {
        self.identity == EMPTY_IDENTITY
    }

    /// Identity rendered as a character, `None` for the sentinel
    pub fn identity_char(&self) -> Option<char> {
        if self.is_empty() {
            None
        } else {
            Some(char::from(self.identity))
        }
    }
}

/// Link-layer (BLE) address of an advertiser
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct LinkAddress([u8; ADDRESS_SIZE]);

impl LinkAddress {
    pub const fn from_bytes(bytes: [u8; ADDRESS_SIZE]) -> Self {
        LinkAddress(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// The last three octets, as printed left to right
    pub fn suffix(&self) -> [u8; ADDRESS_SUFFIX_SIZE] {
        let mut suffix = [0u8; ADDRESS_SUFFIX_SIZE];
        suffix.copy_from_slice(&self.0[ADDRESS_SIZE - ADDRESS_SUFFIX_SIZE..]);
        suffix
    }
}

impl fmt::Debug for LinkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkAddress({})", self)
    }
}

impl fmt::Display for LinkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|b| format!("{:02X}", b)).collect();
        write!(f, "{}", parts.join(":"))
    }
}

impl FromStr for LinkAddress {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != ADDRESS_SIZE {
            return Err(ProtocolError::InvalidAddress(format!(
                "address must be in format XX:XX:XX:XX:XX:XX, got {}",
                s
            )));
        }

        let mut bytes = [0u8; ADDRESS_SIZE];
        for (byte, part) in bytes.iter_mut().zip(parts) {
            if part.len() != 2 {
                return Err(ProtocolError::InvalidAddress(s.to_string()));
            }
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| ProtocolError::InvalidAddress(s.to_string()))?;
        }

        Ok(LinkAddress(bytes))
    }
}

impl Serialize for LinkAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for LinkAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Compass quadrant carried in mobile reports (0-3)
pub fn clamp_direction(direction: i8) -> i8 {
    direction.clamp(0, 3)
}
