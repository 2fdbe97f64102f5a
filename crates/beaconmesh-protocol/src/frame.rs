//! Advertising data framing
//!
//! A raw advertisement is a run of AD structures:
//! - Length (1 byte): number of bytes that follow (type + data)
//! - AD Type (1 byte)
//! - Data (length - 1 bytes)
//!
//! A zero length byte ends the significant part (the rest is padding).
//! Mesh reports travel in a single structure whose AD type is the record tag.

use crate::error::{ProtocolError, Result};
use crate::message::Payload;

/// Maximum legacy advertising data length
pub const MAX_ADV_DATA_SIZE: usize = 31;

/// AD type: flags
pub const AD_TYPE_FLAGS: u8 = 0x01;

/// AD type: shortened local name
pub const AD_TYPE_SHORT_NAME: u8 = 0x08;

/// AD type: complete local name
pub const AD_TYPE_COMPLETE_NAME: u8 = 0x09;

/// LE General Discoverable, BR/EDR not supported
const FLAGS_GENERAL_NO_BREDR: u8 = 0x06;

/// One AD structure borrowed from a raw advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdStructure<'a> {
    pub ad_type: u8,
    pub data: &'a [u8],
}

impl AdStructure<'_> {
    pub fn is_local_name(&self) -> bool {
        self.ad_type == AD_TYPE_SHORT_NAME || self.ad_type == AD_TYPE_COMPLETE_NAME
    }
}

/// Split raw advertising data into AD structures
pub fn parse_ad_structures(bytes: &[u8]) -> Result<Vec<AdStructure<'_>>> {
    let mut structures = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let len = bytes[offset] as usize;
        if len == 0 {
            break;
        }

        let end = offset + 1 + len;
        if end > bytes.len() {
            return Err(ProtocolError::MalformedAdvertisingData { offset });
        }

        structures.push(AdStructure {
            ad_type: bytes[offset + 1],
            data: &bytes[offset + 2..end],
        });
        offset = end;
    }

    Ok(structures)
}

fn push_structure(bytes: &mut Vec<u8>, ad_type: u8, data: &[u8]) {
    bytes.push((data.len() + 1) as u8);
    bytes.push(ad_type);
    bytes.extend_from_slice(data);
}

/// Encode a report as advertising data (flags + tagged record)
pub fn encode_advertisement(payload: &Payload) -> Vec<u8> {
    let record = payload.record_bytes();
    let mut bytes = Vec::with_capacity(3 + 2 + record.len());

    push_structure(&mut bytes, AD_TYPE_FLAGS, &[FLAGS_GENERAL_NO_BREDR]);
    push_structure(&mut bytes, payload.tag().to_u8(), &record);

    debug_assert!(bytes.len() <= MAX_ADV_DATA_SIZE, "Advertisement too large");

    bytes
}

/// Encode a name-only advertisement, as sent by fixed beacons
pub fn encode_name_advertisement(name: &str) -> Result<Vec<u8>> {
    let name = name.as_bytes();
    let size = 3 + 2 + name.len();
    if size > MAX_ADV_DATA_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            size,
            max: MAX_ADV_DATA_SIZE,
        });
    }

    let mut bytes = Vec::with_capacity(size);
    push_structure(&mut bytes, AD_TYPE_FLAGS, &[FLAGS_GENERAL_NO_BREDR]);
    push_structure(&mut bytes, AD_TYPE_COMPLETE_NAME, name);
    Ok(bytes)
}
