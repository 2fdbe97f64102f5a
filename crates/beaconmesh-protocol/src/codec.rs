//! Advertisement classification
//!
//! Turns the raw advertising data of one received frame into a tagged
//! result. Mesh reports are recognised by their AD type tag before any
//! decoding happens; anything else is checked for a fixed-beacon local name.
//!
//! Fixed beacons come in two flavours:
//! - mesh beacons whose name starts with the name marker, identity is the
//!   name's 6th character (`BCN--A` -> `A`)
//! - vendor beacons whose name starts with the vendor marker, identity is
//!   looked up by the last three octets of the sender address

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{ProtocolError, Result};
use crate::frame::parse_ad_structures;
use crate::message::{MobileReport, RelayReport, ReportTag};
use crate::types::{BeaconReading, LinkAddress, ADDRESS_SUFFIX_SIZE, EMPTY_IDENTITY};

/// Default name marker for mesh beacons
pub const DEFAULT_NAME_MARKER: &str = "BCN";

/// Default name prefix advertised by vendor beacons
pub const DEFAULT_VENDOR_MARKER: &str = "KBPro";

/// Position of the identity character in a mesh beacon name
const NAME_IDENTITY_INDEX: usize = 5;

/// Decoded advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advertisement {
    MobileReport(MobileReport),
    RelayReport(RelayReport),
    ForeignBeacon(BeaconReading),
    Unrecognized,
}

/// Address-suffix to identity table for vendor beacons
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BeaconDirectory {
    entries: HashMap<[u8; ADDRESS_SUFFIX_SIZE], u8>,
}

impl BeaconDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, suffix: [u8; ADDRESS_SUFFIX_SIZE], identity: u8) {
        self.entries.insert(suffix, identity);
    }

    /// Identity for `address`, or `EMPTY_IDENTITY` when unknown
    pub fn resolve(&self, address: &LinkAddress) -> u8 {
        self.entries
            .get(&address.suffix())
            .copied()
            .unwrap_or(EMPTY_IDENTITY)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Serialized as `{ "DEAD01": "A" }` so it reads naturally in config files.
impl Serialize for BeaconDirectory {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let map: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|(suffix, id)| (hex::encode_upper(suffix), char::from(*id).to_string()))
            .collect();
        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BeaconDirectory {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let map = BTreeMap::<String, String>::deserialize(deserializer)?;
        let mut directory = BeaconDirectory::new();

        for (suffix_hex, identity) in map {
            let bytes = hex::decode(&suffix_hex).map_err(serde::de::Error::custom)?;
            let suffix: [u8; ADDRESS_SUFFIX_SIZE] = bytes.as_slice().try_into().map_err(|_| {
                serde::de::Error::custom(format!(
                    "address suffix must be {} bytes: {}",
                    ADDRESS_SUFFIX_SIZE, suffix_hex
                ))
            })?;
            directory.insert(suffix, parse_identity(&identity).map_err(serde::de::Error::custom)?);
        }

        Ok(directory)
    }
}

/// Parse a one-character ASCII beacon identity
pub fn parse_identity(s: &str) -> Result<u8> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() && c != '\0' => Ok(c as u8),
        _ => Err(ProtocolError::InvalidBeaconIdentity(s.to_string())),
    }
}

/// Codec configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    pub name_marker: String,
    pub vendor_marker: String,
    #[serde(default)]
    pub directory: BeaconDirectory,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            name_marker: DEFAULT_NAME_MARKER.to_string(),
            vendor_marker: DEFAULT_VENDOR_MARKER.to_string(),
            directory: BeaconDirectory::new(),
        }
    }
}

/// Stateless advertisement decoder
#[derive(Debug, Clone, Default)]
pub struct AdvertisementCodec {
    config: CodecConfig,
}

impl AdvertisementCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Classify one received frame
    ///
    /// # Arguments
    /// * `address` - Sender link-layer address
    /// * `rssi` - Strength the frame was received at
    /// * `data` - Raw advertising data
    pub fn classify_and_decode(
        &self,
        address: &LinkAddress,
        rssi: i8,
        data: &[u8],
    ) -> Result<Advertisement> {
        let structures = parse_ad_structures(data)?;

        if let Some((tag, record)) = structures
            .iter()
            .find_map(|s| ReportTag::from_u8(s.ad_type).map(|tag| (tag, s.data)))
        {
            return match tag {
                ReportTag::Mobile => MobileReport::from_bytes(record).map(Advertisement::MobileReport),
                ReportTag::Relay => RelayReport::from_bytes(record).map(Advertisement::RelayReport),
            };
        }

        for name in structures.iter().filter(|s| s.is_local_name()) {
            if let Some(reading) = self.decode_beacon_name(address, rssi, name.ad_type, name.data)? {
                return Ok(Advertisement::ForeignBeacon(reading));
            }
        }

        Ok(Advertisement::Unrecognized)
    }

    fn decode_beacon_name(
        &self,
        address: &LinkAddress,
        rssi: i8,
        ad_type: u8,
        name: &[u8],
    ) -> Result<Option<BeaconReading>> {
        if name.starts_with(self.config.name_marker.as_bytes()) {
            if name.len() <= NAME_IDENTITY_INDEX {
                return Err(ProtocolError::DecodeTooShort {
                    tag: ad_type,
                    expected: NAME_IDENTITY_INDEX + 1,
                    actual: name.len(),
                });
            }
            return Ok(Some(BeaconReading::new(name[NAME_IDENTITY_INDEX], rssi)));
        }

        if name.starts_with(self.config.vendor_marker.as_bytes()) {
            let identity = self.config.directory.resolve(address);
            if identity == EMPTY_IDENTITY {
                return Err(ProtocolError::UnresolvedBeaconAddress(hex::encode_upper(
                    address.suffix(),
                )));
            }
            return Ok(Some(BeaconReading::new(identity, rssi)));
        }

        Ok(None)
    }
}
