//! Radio link trait

use crate::error::Result;
use beaconmesh_protocol::LinkAddress;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Radio status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadioStatus {
    /// Radio has not been enabled
    Uninitialized,
    /// Radio is enabled and idle
    Idle,
    /// Radio is listening for advertisements
    Scanning,
    /// Radio is broadcasting an advertisement
    Advertising,
    /// Radio failed to come up
    Unavailable,
}

impl fmt::Display for RadioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioStatus::Uninitialized => write!(f, "Uninitialized"),
            RadioStatus::Idle => write!(f, "Idle"),
            RadioStatus::Scanning => write!(f, "Scanning"),
            RadioStatus::Advertising => write!(f, "Advertising"),
            RadioStatus::Unavailable => write!(f, "Unavailable"),
        }
    }
}

/// Advertising PDU type of a received frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvKind {
    /// ADV_IND
    ConnectableUndirected,
    /// ADV_DIRECT_IND
    ConnectableDirected,
    /// ADV_SCAN_IND
    ScannableUndirected,
    /// ADV_NONCONN_IND
    NonConnectableUndirected,
    /// SCAN_RSP
    ScanResponse,
}

impl AdvKind {
    pub fn is_connectable(&self) -> bool {
        matches!(
            self,
            AdvKind::ConnectableUndirected | AdvKind::ConnectableDirected
        )
    }
}

/// A frame delivered by the radio while scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    /// Sender link-layer address
    pub address: LinkAddress,
    /// Received signal strength (dBm)
    pub rssi: i8,
    /// Advertising PDU type
    pub kind: AdvKind,
    /// Raw advertising data
    pub data: Vec<u8>,
}

/// Producer half of a node's inbound frame queue, owned by the radio
pub type FrameSender = mpsc::UnboundedSender<ReceivedFrame>;

/// Consumer half of a node's inbound frame queue, owned by the node loop
pub type FrameReceiver = mpsc::UnboundedReceiver<ReceivedFrame>;

/// Create the single-producer/single-consumer queue between a radio and
/// the node that drains it
pub fn frame_channel() -> (FrameSender, FrameReceiver) {
    mpsc::unbounded_channel()
}

/// Radio link trait
///
/// All calls are non-blocking and idempotent: starting an activity that is
/// already running, or stopping one that is not, succeeds without effect.
pub trait RadioLink: Send {
    /// Bring the radio up; frames received while scanning go to `frames`
    fn enable(&mut self, frames: FrameSender) -> Result<()>;

    /// Start listening for advertisements
    fn start_scan(&mut self) -> Result<()>;

    /// Stop listening
    fn stop_scan(&mut self) -> Result<()>;

    /// Start broadcasting `data` as advertising data
    fn start_advertise(&mut self, data: &[u8]) -> Result<()>;

    /// Stop broadcasting
    fn stop_advertise(&mut self) -> Result<()>;

    fn is_scanning(&self) -> bool;

    fn is_advertising(&self) -> bool;

    fn status(&self) -> RadioStatus;

    /// Address this radio advertises from
    fn local_address(&self) -> LinkAddress;
}
