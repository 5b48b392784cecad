//! Temperature sensors collector.

use sysinfo::Components;
use vigil_types::{FieldKind, FieldSpec, StatRecord};

use super::{now_ms, Collector};
use crate::error::CollectorError;

const FIELDS: &[FieldSpec] = &[
    FieldSpec::new("temperature", "°C", FieldKind::Scalar),
    FieldSpec::new("max", "°C", FieldKind::Scalar),
    FieldSpec::new("critical", "°C", FieldKind::Scalar),
];

/// Samples every temperature component the platform exposes.
///
/// Hosts without readable sensors (containers, some VMs) produce an
/// available record with no instances rather than a failure.
pub struct SensorCollector {
    components: Components,
}

impl SensorCollector {
    /// Create the collector with an empty component list.
    pub fn new() -> Self {
        Self {
            components: Components::new(),
        }
    }
}

impl Default for SensorCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for SensorCollector {
    fn name(&self) -> &'static str {
        "sensors"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        FIELDS
    }

    fn refresh(&mut self, _previous: Option<&StatRecord>) -> Result<StatRecord, CollectorError> {
        self.components.refresh_list();

        let mut builder = StatRecord::builder(self.name()).timestamp_ms(now_ms());

        for component in self.components.iter() {
            let label = component.label().to_string();
            let temperature = f64::from(component.temperature());
            let max = f64::from(component.max());
            let critical = component.critical().map(f64::from);

            builder = builder.instance(label, |mut i| {
                i = i
                    .field("temperature", FieldKind::Scalar, temperature)
                    .field("max", FieldKind::Scalar, max);
                if let Some(critical) = critical {
                    i = i.field("critical", FieldKind::Scalar, critical);
                }
                i
            });
        }

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_succeeds_even_without_sensors() {
        let mut collector = SensorCollector::new();
        let record = collector.refresh(None).unwrap();
        assert!(record.available);
        assert_eq!(record.plugin, "sensors");
    }
}
