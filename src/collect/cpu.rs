//! CPU usage and load average collector.

use sysinfo::System;
use vigil_types::{FieldKind, FieldSpec, StatRecord};

use super::{now_ms, Collector};
use crate::error::CollectorError;

const FIELDS: &[FieldSpec] = &[
    FieldSpec::new("usage_percent", "%", FieldKind::Percent),
    FieldSpec::new("core_count", "", FieldKind::Scalar),
    FieldSpec::new("frequency_mhz", "MHz", FieldKind::Scalar),
    FieldSpec::new("load_1", "", FieldKind::Scalar),
    FieldSpec::new("load_5", "", FieldKind::Scalar),
    FieldSpec::new("load_15", "", FieldKind::Scalar),
];

/// Samples overall CPU usage, core count, frequency and load averages.
///
/// Usage percentages are derived by the backend from the change since the
/// previous refresh, so the first tick reports 0% until a second sample
/// exists.
pub struct CpuCollector {
    system: System,
}

impl CpuCollector {
    /// Create the collector with an empty sampling state.
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for CpuCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for CpuCollector {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        FIELDS
    }

    fn refresh(&mut self, _previous: Option<&StatRecord>) -> Result<StatRecord, CollectorError> {
        self.system.refresh_cpu();

        let global = self.system.global_cpu_info();
        let load = System::load_average();

        Ok(StatRecord::builder(self.name())
            .timestamp_ms(now_ms())
            .field("usage_percent", FieldKind::Percent, f64::from(global.cpu_usage()))
            .field("core_count", FieldKind::Scalar, self.system.cpus().len() as u64)
            .field("frequency_mhz", FieldKind::Scalar, global.frequency())
            .field("load_1", FieldKind::Scalar, load.one)
            .field("load_5", FieldKind::Scalar, load.five)
            .field("load_15", FieldKind::Scalar, load.fifteen)
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_declared_fields() {
        let mut collector = CpuCollector::new();
        let record = collector.refresh(None).unwrap();

        assert!(record.available);
        assert_eq!(record.plugin, "cpu");
        for spec in FIELDS {
            assert!(
                record.value(spec.name).is_some(),
                "missing field {}",
                spec.name
            );
        }
    }

    #[test]
    fn usage_stays_in_percent_range() {
        let mut collector = CpuCollector::new();
        // Two refreshes so the backend has a delta to derive usage from.
        let _ = collector.refresh(None).unwrap();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        let record = collector.refresh(None).unwrap();

        let usage = record.value("usage_percent").unwrap().as_f64().unwrap();
        assert!((0.0..=100.0).contains(&usage), "usage {usage} out of range");
    }
}
