//! Strongest-beacon table
//!
//! Keeps the last reported strength for up to [`BEACONS_PER_REPORT`] fixed
//! beacons. A new beacon takes a free slot when one exists; when the table is
//! full it evicts the slot with the most negative strength, but only among
//! slots below zero, and falls back to the last slot otherwise.

use beaconmesh_protocol::message::BEACONS_PER_REPORT;
use beaconmesh_protocol::types::EMPTY_IDENTITY;
use beaconmesh_protocol::BeaconReading;
use log::trace;
use serde::{Deserialize, Serialize};

/// Slot replaced when no slot reads below zero
const DEFAULT_EVICTION_SLOT: usize = BEACONS_PER_REPORT - 1;

/// Bounded beacon table, one slot per identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconTracker {
    slots: [BeaconReading; BEACONS_PER_REPORT],
}

impl BeaconTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a beacon reading
    pub fn observe(&mut self, identity: u8, strength: i8) {
        if identity == EMPTY_IDENTITY {
            return;
        }

        if let Some(slot) = self.slots.iter_mut().find(|s| s.identity == identity) {
            slot.strength = strength;
            return;
        }

        if let Some(slot) = self.slots.iter_mut().find(|s| s.is_empty()) {
            *slot = BeaconReading::new(identity, strength);
            return;
        }

        let mut candidate = DEFAULT_EVICTION_SLOT;
        let mut weakest = 0i8;
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.strength < weakest {
                weakest = slot.strength;
                candidate = index;
            }
        }

        trace!(
            "Beacon {:?} evicted from slot {} by {:?}",
            self.slots[candidate].identity_char(),
            candidate,
            char::from(identity)
        );
        self.slots[candidate] = BeaconReading::new(identity, strength);
    }

    /// Current table in slot order
    pub fn snapshot(&self) -> [BeaconReading; BEACONS_PER_REPORT] {
        self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }
}
