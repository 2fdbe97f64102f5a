//! Error types for protocol operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Record too short for tag {tag:#04x}: {actual} bytes (expected {expected})")]
    DecodeTooShort {
        tag: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Malformed advertising data at offset {offset}")]
    MalformedAdvertisingData { offset: usize },

    #[error("No beacon registered for address suffix {0}")]
    UnresolvedBeaconAddress(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid beacon identity: {0}")]
    InvalidBeaconIdentity(String),

    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },
}
