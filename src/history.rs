//! Bounded per-field history for trend display.
//!
//! Each `(plugin, field)` key owns a fixed-capacity ring of timestamped
//! samples. The orchestrator feeds the ring after each tick for plugins
//! whose record was available that tick; stale ticks are not recorded, so
//! a failing plugin produces a gap rather than a flat line.

use std::collections::{HashMap, VecDeque};

use vigil_types::{HistoryPoint, RecordBody, StatRecord};

use crate::config::HistoryConfig;

/// Ring-buffered history for every monitored field.
#[derive(Debug)]
pub struct HistoryBuffer {
    config: HistoryConfig,
    series: HashMap<(String, String), VecDeque<HistoryPoint>>,
}

impl HistoryBuffer {
    /// Create an empty buffer with the given sizing.
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            config,
            series: HashMap::new(),
        }
    }

    /// Append one sample for a `(plugin, field)` key.
    ///
    /// On overflow the single oldest entry is evicted, keeping every ring
    /// at or below its configured capacity (O(1) amortized).
    pub fn record(&mut self, plugin: &str, field: &str, timestamp_ms: u64, value: f64) {
        let capacity = self.config.capacity_for(plugin);
        let ring = self
            .series
            .entry((plugin.to_string(), field.to_string()))
            .or_default();

        ring.push_back(HistoryPoint::new(timestamp_ms, value));
        while ring.len() > capacity {
            ring.pop_front();
        }
    }

    /// Append every numeric field of an available record.
    ///
    /// Multi-instance fields are keyed as `"instance.field"`. Text fields
    /// have no numeric form and are skipped. Unavailable records must not
    /// reach this method; the orchestrator filters them out.
    pub fn record_tick(&mut self, record: &StatRecord) {
        debug_assert!(record.available);

        match &record.body {
            RecordBody::Flat(values) => {
                for fv in values {
                    if let Some(value) = fv.value.as_f64() {
                        self.record(&record.plugin, &fv.field, record.timestamp_ms, value);
                    }
                }
            }
            RecordBody::Instances(instances) => {
                for sub in instances {
                    for fv in &sub.values {
                        if let Some(value) = fv.value.as_f64() {
                            let key = format!("{}.{}", sub.name, fv.field);
                            self.record(&record.plugin, &key, record.timestamp_ms, value);
                        }
                    }
                }
            }
        }
    }

    /// The most recent `max_points` samples for a key, in chronological
    /// order. Unknown keys return an empty vector.
    pub fn query(&self, plugin: &str, field: &str, max_points: usize) -> Vec<HistoryPoint> {
        let Some(ring) = self
            .series
            .get(&(plugin.to_string(), field.to_string()))
        else {
            return Vec::new();
        };

        let skip = ring.len().saturating_sub(max_points);
        ring.iter().skip(skip).copied().collect()
    }

    /// Number of keys with at least one sample.
    pub fn key_count(&self) -> usize {
        self.series.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use vigil_types::FieldKind;

    fn buffer_with_capacity(capacity: usize) -> HistoryBuffer {
        HistoryBuffer::new(HistoryConfig {
            capacity,
            per_plugin: BTreeMap::new(),
        })
    }

    #[test]
    fn eviction_is_oldest_first() {
        let mut history = buffer_with_capacity(3);
        for (ts, value) in [(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0)] {
            history.record("cpu", "usage_percent", ts, value);
        }

        let points = history.query("cpu", "usage_percent", 10);
        let timestamps: Vec<u64> = points.iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(timestamps, [2, 3, 4]);
    }

    #[test]
    fn query_returns_most_recent_in_chronological_order() {
        let mut history = buffer_with_capacity(10);
        for ts in 1..=6u64 {
            history.record("mem", "used", ts, ts as f64);
        }

        let points = history.query("mem", "used", 3);
        let timestamps: Vec<u64> = points.iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(timestamps, [4, 5, 6]);
    }

    #[test]
    fn zero_max_points_returns_empty() {
        let mut history = buffer_with_capacity(10);
        history.record("mem", "used", 1, 1.0);
        assert!(history.query("mem", "used", 0).is_empty());
    }

    #[test]
    fn unknown_key_returns_empty() {
        let history = buffer_with_capacity(10);
        assert!(history.query("ghost", "field", 5).is_empty());
    }

    #[test]
    fn per_plugin_capacity_override() {
        let mut per_plugin = BTreeMap::new();
        per_plugin.insert("net".to_string(), 2);
        let mut history = HistoryBuffer::new(HistoryConfig {
            capacity: 5,
            per_plugin,
        });

        for ts in 1..=4u64 {
            history.record("net", "eth0.rx_rate", ts, 0.0);
            history.record("cpu", "usage_percent", ts, 0.0);
        }

        assert_eq!(history.query("net", "eth0.rx_rate", 10).len(), 2);
        assert_eq!(history.query("cpu", "usage_percent", 10).len(), 4);
    }

    #[test]
    fn record_tick_flattens_instances_and_skips_text() {
        let record = StatRecord::builder("net")
            .timestamp_ms(100)
            .instance("eth0", |i| {
                i.field("rx_total", FieldKind::Scalar, 1024u64)
                    .field("state", FieldKind::Text, "up")
            })
            .build();

        let mut history = buffer_with_capacity(10);
        history.record_tick(&record);

        assert_eq!(history.query("net", "eth0.rx_total", 10).len(), 1);
        assert!(history.query("net", "eth0.state", 10).is_empty());
        assert_eq!(history.key_count(), 1);
    }
}
