//! Base station listener
//!
//! Scans continuously and turns every mesh report it hears into one JSON
//! record. Only connectable advertisements are considered, so beacon name
//! frames never reach the decoder. Identical copies of a report heard
//! within one poll collapse into a single record.

use anyhow::{Context, Result};
use beaconmesh_network::{frame_channel, FrameReceiver, RadioLink};
use beaconmesh_protocol::{
    Advertisement, AdvertisementCodec, BeaconReading, CodecConfig, LinkAddress, MobileReport,
    NodeId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use tracing::{debug, trace};

/// One decoded report as emitted by the base station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub mobile_id: u8,
    pub b1: String,
    pub b2: String,
    pub b3: String,
    pub b1r: i8,
    pub b2r: i8,
    pub b3r: i8,
    pub speed: i8,
    pub direction: i8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<u8>,
    pub rssi: i8,
    pub address: LinkAddress,
    pub timestamp: DateTime<Utc>,
}

impl ReportRecord {
    fn new(report: &MobileReport, rssi: i8, address: LinkAddress, timestamp: DateTime<Utc>) -> Self {
        let [b1, b2, b3] = report.beacons;
        Self {
            mobile_id: report.mobile_id.as_u8(),
            b1: identity(&b1),
            b2: identity(&b2),
            b3: identity(&b3),
            b1r: b1.strength,
            b2r: b2.strength,
            b3r: b3.strength,
            speed: report.speed,
            direction: report.direction,
            ttl: None,
            origin_id: None,
            rssi,
            address,
            timestamp,
        }
    }

    /// Write as a single JSON line
    pub fn write_line<W: Write>(&self, mut out: W) -> Result<()> {
        let line = serde_json::to_string(self).context("Failed to encode report")?;
        writeln!(out, "{}", line).context("Failed to write report")?;
        Ok(())
    }
}

fn identity(reading: &BeaconReading) -> String {
    reading.identity_char().map(String::from).unwrap_or_default()
}

/// Base station counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseStats {
    pub frames: u64,
    pub reports: u64,
    pub duplicates: u64,
    pub decode_errors: u64,
}

/// Passive, always-scanning report sink
pub struct BaseStation<R: RadioLink> {
    radio: R,
    frames: FrameReceiver,
    codec: AdvertisementCodec,
    stats: BaseStats,
}

impl<R: RadioLink> BaseStation<R> {
    pub fn new(mut radio: R, codec: CodecConfig) -> Result<Self> {
        let (sink, frames) = frame_channel();
        radio
            .enable(sink)
            .context("Base station radio unavailable")?;
        radio
            .start_scan()
            .context("Base station failed to start scanning")?;

        Ok(Self {
            radio,
            frames,
            codec: AdvertisementCodec::new(codec),
            stats: BaseStats::default(),
        })
    }

    /// Decode everything heard since the last poll
    pub fn poll(&mut self) -> Vec<ReportRecord> {
        let mut records = Vec::new();
        let mut batch: HashSet<(Option<i8>, Option<NodeId>, MobileReport)> = HashSet::new();
        let now = Utc::now();

        while let Ok(frame) = self.frames.try_recv() {
            self.stats.frames += 1;
            if !frame.kind.is_connectable() {
                continue;
            }

            let advertisement =
                match self
                    .codec
                    .classify_and_decode(&frame.address, frame.rssi, &frame.data)
                {
                    Ok(advertisement) => advertisement,
                    Err(e) => {
                        self.stats.decode_errors += 1;
                        trace!("Base discarded frame from {}: {}", frame.address, e);
                        continue;
                    }
                };

            let (ttl, origin, report) = match advertisement {
                Advertisement::MobileReport(report) => (None, None, report),
                Advertisement::RelayReport(relay) => {
                    (Some(relay.ttl), Some(relay.origin_id), relay.payload)
                }
                _ => continue,
            };

            if !batch.insert((ttl, origin, report)) {
                self.stats.duplicates += 1;
                continue;
            }

            let mut record = ReportRecord::new(&report, frame.rssi, frame.address, now);
            record.ttl = ttl;
            record.origin_id = origin.map(|id| id.as_u8());
            debug!(
                "Base received report for mobile {} via {}",
                report.mobile_id, frame.address
            );

            self.stats.reports += 1;
            records.push(record);
        }

        records
    }

    pub fn stats(&self) -> &BaseStats {
        &self.stats
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }
}
