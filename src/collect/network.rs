//! Per-interface network throughput collector.
//!
//! Reports cumulative byte counters per interface and, from the second
//! tick on, per-second throughput rates derived by differencing the
//! counters against this collector's own previous record.

use sysinfo::Networks;
use vigil_types::{FieldKind, FieldSpec, StatRecord, Value};

use super::{now_ms, rate_between, Collector};
use crate::error::CollectorError;

const FIELDS: &[FieldSpec] = &[
    FieldSpec::new("rx_total", "B", FieldKind::Scalar),
    FieldSpec::new("tx_total", "B", FieldKind::Scalar),
    FieldSpec::new("rx_rate", "B/s", FieldKind::Rate),
    FieldSpec::new("tx_rate", "B/s", FieldKind::Rate),
];

/// Samples every network interface's cumulative traffic counters.
///
/// On the first tick (and after a re-enable) only the raw cumulative
/// totals are reported; rates appear once a previous record exists to
/// difference against. A counter that goes backwards (interface reset)
/// suppresses the rate for that tick rather than reporting a negative.
pub struct NetworkCollector {
    networks: Networks,
}

impl NetworkCollector {
    /// Create the collector with an empty interface list.
    pub fn new() -> Self {
        Self {
            networks: Networks::new(),
        }
    }
}

impl Default for NetworkCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for NetworkCollector {
    fn name(&self) -> &'static str {
        "net"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        FIELDS
    }

    fn refresh(&mut self, previous: Option<&StatRecord>) -> Result<StatRecord, CollectorError> {
        self.networks.refresh_list();

        let timestamp_ms = now_ms();
        let elapsed_ms = previous.map(|p| timestamp_ms.saturating_sub(p.timestamp_ms));

        let mut builder = StatRecord::builder(self.name()).timestamp_ms(timestamp_ms);

        let mut interfaces: Vec<_> = self.networks.iter().collect();
        interfaces.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (name, data) in interfaces {
            let rx_total = data.total_received();
            let tx_total = data.total_transmitted();

            builder = builder.instance(name.as_str(), |mut i| {
                i = i
                    .field("rx_total", FieldKind::Scalar, rx_total)
                    .field("tx_total", FieldKind::Scalar, tx_total);

                if let (Some(elapsed), Some(prev)) =
                    (elapsed_ms, previous.and_then(|p| p.instance(name)))
                {
                    if let Some(rate) = prev
                        .value("rx_total")
                        .and_then(prev_counter)
                        .and_then(|before| rate_between(rx_total, before, elapsed))
                    {
                        i = i.field("rx_rate", FieldKind::Rate, rate);
                    }
                    if let Some(rate) = prev
                        .value("tx_total")
                        .and_then(prev_counter)
                        .and_then(|before| rate_between(tx_total, before, elapsed))
                    {
                        i = i.field("tx_rate", FieldKind::Rate, rate);
                    }
                }
                i
            });
        }

        Ok(builder.build())
    }
}

fn prev_counter(value: &Value) -> Option<u64> {
    match value {
        Value::Int(v) => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_has_no_rates() {
        let mut collector = NetworkCollector::new();
        let record = collector.refresh(None).unwrap();

        assert!(record.available);
        for (_, fv) in record.flattened() {
            assert_ne!(fv.kind, FieldKind::Rate, "rate field on first tick");
        }
    }

    #[test]
    fn rates_appear_against_a_previous_record() {
        // Synthesize a previous record with lower counters so rates are
        // derivable regardless of the host's real interfaces.
        let mut collector = NetworkCollector::new();
        let current = collector.refresh(None).unwrap();

        let mut names: Vec<String> = current
            .flattened()
            .map(|(instance, _)| instance.to_string())
            .collect();
        names.sort();
        names.dedup();

        let mut previous = StatRecord::builder("net")
            .timestamp_ms(current.timestamp_ms.saturating_sub(1000));
        for name in &names {
            previous = previous.instance(name.clone(), |i| {
                i.field("rx_total", FieldKind::Scalar, 0u64)
                    .field("tx_total", FieldKind::Scalar, 0u64)
            });
        }
        let previous = previous.build();

        let record = collector.refresh(Some(&previous)).unwrap();
        // Every interface present in both records now carries rate fields.
        for name in &names {
            let sub = record.instance(name).expect("interface disappeared");
            assert!(sub.value("rx_rate").is_some(), "no rx_rate for {name}");
            assert!(sub.value("tx_rate").is_some(), "no tx_rate for {name}");
        }
    }
}
