//! Routing error types

use beaconmesh_protocol::NodeId;
use thiserror::Error;

/// Reasons a relay report is not taken for forwarding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Report originated here (origin {0})")]
    SelfLoop(NodeId),

    #[error("TTL exhausted (ttl {0})")]
    TtlExhausted(i8),
}

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;
