//! RAM and swap usage collector.

use sysinfo::System;
use vigil_types::{FieldKind, FieldSpec, StatRecord};

use super::{now_ms, Collector};
use crate::error::CollectorError;

const FIELDS: &[FieldSpec] = &[
    FieldSpec::new("total", "B", FieldKind::Scalar),
    FieldSpec::new("used", "B", FieldKind::Scalar),
    FieldSpec::new("available", "B", FieldKind::Scalar),
    FieldSpec::new("used_percent", "%", FieldKind::Percent),
    FieldSpec::new("swap_total", "B", FieldKind::Scalar),
    FieldSpec::new("swap_used", "B", FieldKind::Scalar),
    FieldSpec::new("swap_used_percent", "%", FieldKind::Percent),
];

/// Samples physical memory and swap usage.
pub struct MemoryCollector {
    system: System,
}

impl MemoryCollector {
    /// Create the collector with an empty sampling state.
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for MemoryCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for MemoryCollector {
    fn name(&self) -> &'static str {
        "mem"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        FIELDS
    }

    fn refresh(&mut self, _previous: Option<&StatRecord>) -> Result<StatRecord, CollectorError> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        let used = self.system.used_memory();
        let swap_total = self.system.total_swap();
        let swap_used = self.system.used_swap();

        Ok(StatRecord::builder(self.name())
            .timestamp_ms(now_ms())
            .field("total", FieldKind::Scalar, total)
            .field("used", FieldKind::Scalar, used)
            .field("available", FieldKind::Scalar, self.system.available_memory())
            .field("used_percent", FieldKind::Percent, percent_of(used, total))
            .field("swap_total", FieldKind::Scalar, swap_total)
            .field("swap_used", FieldKind::Scalar, swap_used)
            .field(
                "swap_used_percent",
                FieldKind::Percent,
                percent_of(swap_used, swap_total),
            )
            .build())
    }
}

/// Percentage of `part` in `whole`; 0 when `whole` is zero (no swap).
fn percent_of(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / whole as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_declared_fields() {
        let mut collector = MemoryCollector::new();
        let record = collector.refresh(None).unwrap();

        assert!(record.available);
        assert_eq!(record.plugin, "mem");
        for spec in FIELDS {
            assert!(
                record.value(spec.name).is_some(),
                "missing field {}",
                spec.name
            );
        }
    }

    #[test]
    fn used_percent_stays_in_range() {
        let mut collector = MemoryCollector::new();
        let record = collector.refresh(None).unwrap();

        let used = record.value("used_percent").unwrap().as_f64().unwrap();
        assert!((0.0..=100.0).contains(&used), "used {used} out of range");
    }

    #[test]
    fn percent_of_zero_whole_is_zero() {
        assert_eq!(percent_of(100, 0), 0.0);
        assert_eq!(percent_of(50, 200), 25.0);
    }
}
