//! Radio activity counters

use serde::{Deserialize, Serialize};

/// Activity metrics for one radio
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioMetrics {
    /// Advertising events that reached at least the air
    pub frames_sent: u64,

    /// Frames delivered to the node's queue
    pub frames_received: u64,

    /// Total bytes delivered to the node's queue
    pub bytes_received: u64,

    /// Frames lost because the node's queue was closed
    pub frames_dropped: u64,

    /// Scan sessions started
    pub scans_started: u64,

    /// Advertising sessions started
    pub adverts_started: u64,

    /// Start/stop calls that returned an error
    pub op_failures: u64,
}

impl RadioMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame handed to the node
    pub fn record_receive(&mut self, bytes: usize) {
        self.frames_received += 1;
        self.bytes_received += bytes as u64;
    }

    pub fn record_drop(&mut self) {
        self.frames_dropped += 1;
    }

    pub fn record_send(&mut self) {
        self.frames_sent += 1;
    }

    pub fn record_op_failure(&mut self) {
        self.op_failures += 1;
    }

    /// Share of delivered frames among all frames addressed to this radio
    pub fn delivery_rate(&self) -> f64 {
        let total = self.frames_received + self.frames_dropped;
        if total > 0 {
            self.frames_received as f64 / total as f64
        } else {
            1.0
        }
    }
}
