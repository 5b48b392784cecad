//! The immutable aggregate of all plugins' latest records for one tick.

use alloc::collections::BTreeMap;
use alloc::string::String;

use crate::{ProtocolVersion, StatRecord};

/// A point-in-time view of every enabled plugin's latest record.
///
/// Exactly one bundle is "current" at any instant. The orchestrator builds
/// a fresh bundle each tick and publishes it with a single atomic reference
/// swap, so a reader always sees a self-consistent set of records captured
/// in the same tick - never a mix of old and new per-plugin records.
///
/// Bundles are never mutated after publication; a new tick produces a new
/// bundle and old ones are dropped once no longer referenced.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatsBundle {
    /// Protocol version the bundle was produced with.
    pub version: ProtocolVersion,

    /// Monotonically increasing tick counter, strictly increasing across
    /// published bundles.
    pub sequence: u64,

    /// Unix timestamp in milliseconds of the tick that produced the bundle.
    pub timestamp_ms: u64,

    /// Latest record per plugin, keyed by plugin name.
    pub records: BTreeMap<String, StatRecord>,
}

impl StatsBundle {
    /// An empty bundle, used as the published value before the first tick.
    pub fn empty() -> Self {
        Self {
            version: ProtocolVersion::current(),
            sequence: 0,
            timestamp_ms: 0,
            records: BTreeMap::new(),
        }
    }

    /// Create a bundle from assembled records.
    pub fn new(sequence: u64, timestamp_ms: u64, records: BTreeMap<String, StatRecord>) -> Self {
        Self {
            version: ProtocolVersion::current(),
            sequence,
            timestamp_ms,
            records,
        }
    }

    /// Get the record for a plugin.
    pub fn get(&self, plugin: &str) -> Option<&StatRecord> {
        self.records.get(plugin)
    }

    /// Number of plugin records in the bundle.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the bundle holds no records (nothing published yet).
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over all records.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &StatRecord)> {
        self.records.iter()
    }

    /// Plugins whose record failed this tick.
    pub fn unavailable(&self) -> impl Iterator<Item = &StatRecord> {
        self.records.values().filter(|r| !r.available)
    }
}
