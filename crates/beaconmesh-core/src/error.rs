//! Node error types

use beaconmesh_network::NetworkError;
use beaconmesh_protocol::ProtocolError;
use beaconmesh_routing::RoutingError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Radio unavailable: {0}")]
    RadioUnavailable(String),

    #[error("Scheduler already started")]
    AlreadyStarted,

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
