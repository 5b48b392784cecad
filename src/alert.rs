//! Threshold evaluation with hysteresis and flap damping.
//!
//! Each configured `(plugin, field)` key carries an [`AlertLevel`]. A
//! sample qualifies a key for a different level when it crosses that
//! level's enter boundary upward, or drops below the current level's exit
//! boundary. A transition is committed only once the configured number of
//! consecutive qualifying samples has been observed; the running count
//! resets whenever a sample stops qualifying.

use std::collections::{HashMap, VecDeque};

use tracing::info;
use vigil_types::{AlertLevel, AlertLimits, AlertLogEntry, FieldLimits, StatsBundle};

#[derive(Debug, Clone, Copy)]
struct Pending {
    target: AlertLevel,
    count: u32,
}

#[derive(Debug, Default)]
struct KeyState {
    current: AlertLevel,
    pending: Option<Pending>,
}

/// Evaluates the latest bundle against the configured thresholds and
/// maintains the append-only alert log.
///
/// Owned by the orchestrator; consumers read the log through the server
/// protocol and never mutate it.
#[derive(Debug)]
pub struct AlertEvaluator {
    limits: AlertLimits,
    log_capacity: usize,
    states: HashMap<String, KeyState>,
    log: VecDeque<AlertLogEntry>,
}

impl AlertEvaluator {
    /// Create an evaluator for the given threshold configuration.
    pub fn new(limits: AlertLimits, log_capacity: usize) -> Self {
        Self {
            limits,
            log_capacity,
            states: HashMap::new(),
            log: VecDeque::new(),
        }
    }

    /// The active threshold configuration.
    pub fn limits(&self) -> &AlertLimits {
        &self.limits
    }

    /// Current level for a key, `Ok` when the key has never qualified.
    pub fn level_of(&self, key: &str) -> AlertLevel {
        self.states
            .get(key)
            .map(|s| s.current)
            .unwrap_or(AlertLevel::Ok)
    }

    /// Alert log entries whose state began at or after `since_ms`.
    ///
    /// `None` returns the full retained log, oldest first.
    pub fn log_since(&self, since_ms: Option<u64>) -> Vec<AlertLogEntry> {
        let cutoff = since_ms.unwrap_or(0);
        self.log
            .iter()
            .filter(|e| e.start_ms >= cutoff)
            .cloned()
            .collect()
    }

    /// Evaluate one published bundle.
    ///
    /// Returns the transitions committed this tick. Unavailable records
    /// are skipped entirely rather than treated as zero, leaving both the
    /// key's level and its pending count untouched.
    pub fn evaluate(&mut self, bundle: &StatsBundle) -> Vec<AlertLogEntry> {
        let mut committed = Vec::new();

        for (plugin, record) in bundle.iter() {
            if !record.available {
                continue;
            }

            for (instance, fv) in record.flattened() {
                let field_key = if instance.is_empty() {
                    fv.field.clone()
                } else {
                    format!("{}.{}", instance, fv.field)
                };
                let key = format!("{}.{}", plugin, field_key);

                let Some(limits) = self.limits.get(&key) else {
                    continue;
                };
                let Some(value) = fv.value.as_f64() else {
                    continue;
                };

                let limits = limits.clone();
                if let Some(entry) =
                    self.observe(plugin, &field_key, &key, &limits, value, bundle.timestamp_ms)
                {
                    committed.push(entry);
                }
            }
        }

        committed
    }

    /// Process one qualifying-or-not sample for a key.
    fn observe(
        &mut self,
        plugin: &str,
        field: &str,
        key: &str,
        limits: &FieldLimits,
        value: f64,
        timestamp_ms: u64,
    ) -> Option<AlertLogEntry> {
        let required = self.limits.repeat_for(limits);
        let state = self.states.entry(key.to_string()).or_default();
        let target = target_level(state.current, limits, value);

        if target == state.current {
            state.pending = None;
            return None;
        }

        let count = match state.pending {
            Some(p) if p.target == target => p.count + 1,
            _ => 1,
        };

        if count < required {
            state.pending = Some(Pending { target, count });
            return None;
        }

        // Enough consecutive qualifying samples: commit the transition.
        let from = state.current;
        state.current = target;
        state.pending = None;

        info!(
            key,
            from = %from,
            to = %target,
            value,
            "alert state transition"
        );

        self.close_open_entry(plugin, field, timestamp_ms);
        let entry = AlertLogEntry::open(plugin, field, from, target, timestamp_ms);
        self.log.push_back(entry.clone());
        while self.log.len() > self.log_capacity {
            self.log.pop_front();
        }

        Some(entry)
    }

    fn close_open_entry(&mut self, plugin: &str, field: &str, end_ms: u64) {
        if let Some(open) = self
            .log
            .iter_mut()
            .rev()
            .find(|e| e.is_open() && e.plugin == plugin && e.field == field)
        {
            open.close(end_ms);
        }
    }
}

/// Resolve the level a sample qualifies the key for.
///
/// The current level's exit boundary is consulted first: while the value
/// holds at or above it, the key stays put unless a higher severity's
/// enter boundary is crossed. Only when the value drops below the exit
/// boundary is a lower level (resolved against enter boundaries)
/// qualified.
fn target_level(current: AlertLevel, limits: &FieldLimits, value: f64) -> AlertLevel {
    let candidate = [AlertLevel::Critical, AlertLevel::Warning, AlertLevel::Careful]
        .into_iter()
        .find(|level| {
            limits
                .band(*level)
                .is_some_and(|band| value >= band.enter)
        })
        .unwrap_or(AlertLevel::Ok);

    if candidate > current {
        return candidate;
    }

    match limits.band(current) {
        // Within the hysteresis band of the current level: stay.
        Some(band) if value >= band.exit => current,
        _ => candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use vigil_types::{Band, FieldKind, StatRecord};

    fn limits(min_repeat: u32) -> AlertLimits {
        let mut fields = BTreeMap::new();
        fields.insert(
            "cpu.usage_percent".to_string(),
            FieldLimits {
                careful: Band::new(50.0, 45.0),
                warning: Band::new(70.0, 65.0),
                critical: Band::new(90.0, 85.0),
                min_repeat: None,
            },
        );
        AlertLimits {
            min_repeat,
            fields,
        }
    }

    fn bundle_with(value: f64, sequence: u64, available: bool) -> StatsBundle {
        let mut record = StatRecord::builder("cpu")
            .timestamp_ms(sequence * 1000)
            .field("usage_percent", FieldKind::Percent, value)
            .build();
        record.available = available;

        let mut records = BTreeMap::new();
        records.insert("cpu".to_string(), record);
        StatsBundle::new(sequence, sequence * 1000, records)
    }

    #[test]
    fn transition_requires_consecutive_samples() {
        let mut evaluator = AlertEvaluator::new(limits(3), 100);

        // Two qualifying samples: no transition yet.
        assert!(evaluator.evaluate(&bundle_with(75.0, 1, true)).is_empty());
        assert!(evaluator.evaluate(&bundle_with(75.0, 2, true)).is_empty());
        assert_eq!(evaluator.level_of("cpu.usage_percent"), AlertLevel::Ok);

        // Third qualifying sample commits exactly one transition.
        let committed = evaluator.evaluate(&bundle_with(75.0, 3, true));
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].from, AlertLevel::Ok);
        assert_eq!(committed[0].to, AlertLevel::Warning);
        assert_eq!(evaluator.level_of("cpu.usage_percent"), AlertLevel::Warning);
    }

    #[test]
    fn non_qualifying_sample_resets_the_count() {
        let mut evaluator = AlertEvaluator::new(limits(3), 100);

        evaluator.evaluate(&bundle_with(75.0, 1, true));
        evaluator.evaluate(&bundle_with(75.0, 2, true));
        // Back under every boundary: pending count resets.
        evaluator.evaluate(&bundle_with(10.0, 3, true));
        evaluator.evaluate(&bundle_with(75.0, 4, true));
        evaluator.evaluate(&bundle_with(75.0, 5, true));
        assert_eq!(evaluator.level_of("cpu.usage_percent"), AlertLevel::Ok);

        let committed = evaluator.evaluate(&bundle_with(75.0, 6, true));
        assert_eq!(committed.len(), 1);
    }

    #[test]
    fn exit_boundary_resists_flapping() {
        let mut evaluator = AlertEvaluator::new(limits(1), 100);

        evaluator.evaluate(&bundle_with(75.0, 1, true));
        assert_eq!(evaluator.level_of("cpu.usage_percent"), AlertLevel::Warning);

        // 67 is below warning.enter (70) but above warning.exit (65): stay.
        assert!(evaluator.evaluate(&bundle_with(67.0, 2, true)).is_empty());
        assert_eq!(evaluator.level_of("cpu.usage_percent"), AlertLevel::Warning);

        // Below warning.exit: drop to the level the value still enters.
        let committed = evaluator.evaluate(&bundle_with(60.0, 3, true));
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].to, AlertLevel::Careful);
    }

    #[test]
    fn unavailable_records_are_skipped() {
        let mut evaluator = AlertEvaluator::new(limits(2), 100);

        evaluator.evaluate(&bundle_with(95.0, 1, true));
        // An unavailable sample neither transitions nor resets the count.
        evaluator.evaluate(&bundle_with(0.0, 2, false));
        let committed = evaluator.evaluate(&bundle_with(95.0, 3, true));

        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].to, AlertLevel::Critical);
    }

    #[test]
    fn commit_closes_the_previous_open_entry() {
        let mut evaluator = AlertEvaluator::new(limits(1), 100);

        evaluator.evaluate(&bundle_with(75.0, 1, true));
        evaluator.evaluate(&bundle_with(95.0, 2, true));

        let log = evaluator.log_since(None);
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].end_ms, Some(2000));
        assert!(log[1].is_open());
        assert_eq!(log[1].from, AlertLevel::Warning);
        assert_eq!(log[1].to, AlertLevel::Critical);
    }

    #[test]
    fn log_since_filters_by_start_time() {
        let mut evaluator = AlertEvaluator::new(limits(1), 100);
        evaluator.evaluate(&bundle_with(75.0, 1, true));
        evaluator.evaluate(&bundle_with(95.0, 2, true));

        assert_eq!(evaluator.log_since(Some(2000)).len(), 1);
        assert_eq!(evaluator.log_since(Some(5000)).len(), 0);
        assert_eq!(evaluator.log_since(None).len(), 2);
    }

    #[test]
    fn log_capacity_evicts_oldest() {
        let mut evaluator = AlertEvaluator::new(limits(1), 2);

        evaluator.evaluate(&bundle_with(55.0, 1, true)); // Ok -> Careful
        evaluator.evaluate(&bundle_with(75.0, 2, true)); // Careful -> Warning
        evaluator.evaluate(&bundle_with(95.0, 3, true)); // Warning -> Critical

        let log = evaluator.log_since(None);
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].to, AlertLevel::Warning);
    }

    #[test]
    fn per_field_repeat_overrides_default() {
        let mut config = limits(5);
        config
            .fields
            .get_mut("cpu.usage_percent")
            .unwrap()
            .min_repeat = Some(1);
        let mut evaluator = AlertEvaluator::new(config, 100);

        let committed = evaluator.evaluate(&bundle_with(75.0, 1, true));
        assert_eq!(committed.len(), 1);
    }

    #[test]
    fn unconfigured_keys_are_ignored() {
        let mut evaluator = AlertEvaluator::new(AlertLimits::default(), 100);
        assert!(evaluator.evaluate(&bundle_with(99.0, 1, true)).is_empty());
        assert!(evaluator.log_since(None).is_empty());
    }
}
