//! Network error types

use thiserror::Error;

/// Radio-specific errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("Radio unavailable: {0}")]
    RadioUnavailable(String),

    #[error("Radio not enabled")]
    RadioNotEnabled,

    #[error("Radio operation {op} failed: {reason}")]
    RadioOpFailed { op: &'static str, reason: String },

    #[error("Advertising data too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Address already attached: {0}")]
    AddressInUse(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] beaconmesh_protocol::ProtocolError),
}

impl NetworkError {
    pub fn op_failed(op: &'static str, reason: impl Into<String>) -> Self {
        NetworkError::RadioOpFailed {
            op,
            reason: reason.into(),
        }
    }
}

/// Result type for network operations
pub type Result<T> = std::result::Result<T, NetworkError>;
