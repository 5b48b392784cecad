//! Per-plugin stat records - one plugin's output for one tick.

use alloc::string::String;
use alloc::vec::Vec;

use crate::{FieldKind, FieldValue, Value};

/// The payload of a [`StatRecord`].
///
/// Single-instance plugins (CPU, memory) report a flat ordered list of
/// field/value pairs. Multi-instance plugins (disks, network interfaces)
/// report one named sub-record per instance, each with its own pairs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RecordBody {
    /// Ordered field/value pairs for a single-instance plugin.
    Flat(Vec<FieldValue>),
    /// Ordered named sub-records for a multi-instance plugin.
    Instances(Vec<SubRecord>),
}

impl RecordBody {
    /// True if the body holds no values at all.
    pub fn is_empty(&self) -> bool {
        match self {
            RecordBody::Flat(values) => values.is_empty(),
            RecordBody::Instances(instances) => instances.is_empty(),
        }
    }
}

/// One instance of a multi-instance plugin (a disk, an interface, a process).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubRecord {
    /// Instance name (e.g. `"eth0"`, `"sda"`).
    pub name: String,
    /// Ordered field/value pairs for this instance.
    pub values: Vec<FieldValue>,
}

impl SubRecord {
    /// Look up a value by field name.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|fv| fv.field == field)
            .map(|fv| &fv.value)
    }
}

/// One plugin's output for one tick.
///
/// Records are created once per tick and never mutated after the bundle
/// holding them is published. When a plugin fails or times out, the
/// orchestrator republishes the previous body with `available` set to
/// false, so consumers keep showing the last known values marked stale.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatRecord {
    /// Name of the plugin that produced this record.
    pub plugin: String,

    /// Unix timestamp in milliseconds when the sample was taken.
    pub timestamp_ms: u64,

    /// False when the plugin failed this tick and the body is a stale copy
    /// of the previous record.
    pub available: bool,

    /// How long the collection took, in microseconds.
    #[cfg_attr(feature = "serde", serde(default))]
    pub collect_micros: u64,

    /// The reported values.
    pub body: RecordBody,
}

impl StatRecord {
    /// Create a builder for a record.
    pub fn builder(plugin: impl Into<String>) -> StatRecordBuilder {
        StatRecordBuilder::new(plugin)
    }

    /// An unavailable record carrying the body of a previous record.
    ///
    /// Used by the orchestrator when a plugin fails or times out: the stale
    /// body keeps display continuity while `available: false` marks it.
    pub fn stale(previous: &StatRecord, timestamp_ms: u64) -> Self {
        Self {
            plugin: previous.plugin.clone(),
            timestamp_ms,
            available: false,
            collect_micros: 0,
            body: previous.body.clone(),
        }
    }

    /// An unavailable, empty record for a plugin that has never succeeded.
    pub fn empty(plugin: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            plugin: plugin.into(),
            timestamp_ms,
            available: false,
            collect_micros: 0,
            body: RecordBody::Flat(Vec::new()),
        }
    }

    /// Look up a top-level value by field name (flat records only).
    pub fn value(&self, field: &str) -> Option<&Value> {
        match &self.body {
            RecordBody::Flat(values) => values
                .iter()
                .find(|fv| fv.field == field)
                .map(|fv| &fv.value),
            RecordBody::Instances(_) => None,
        }
    }

    /// Look up a sub-record by instance name (multi-instance records only).
    pub fn instance(&self, name: &str) -> Option<&SubRecord> {
        match &self.body {
            RecordBody::Flat(_) => None,
            RecordBody::Instances(instances) => instances.iter().find(|i| i.name == name),
        }
    }

    /// Iterate every `(instance, field, value)` triple in the record.
    ///
    /// Flat records yield an empty instance name. This is the view the
    /// history buffer and alert evaluator consume.
    pub fn flattened(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        let (flat, instances) = match &self.body {
            RecordBody::Flat(values) => (Some(values), None),
            RecordBody::Instances(subs) => (None, Some(subs)),
        };

        flat.into_iter()
            .flatten()
            .map(|fv| ("", fv))
            .chain(instances.into_iter().flatten().flat_map(|sub| {
                sub.values.iter().map(move |fv| (sub.name.as_str(), fv))
            }))
    }
}

/// Builder for [`StatRecord`].
#[derive(Debug)]
pub struct StatRecordBuilder {
    plugin: String,
    timestamp_ms: Option<u64>,
    collect_micros: u64,
    values: Vec<FieldValue>,
    instances: Vec<SubRecord>,
}

impl StatRecordBuilder {
    /// Create a new builder for the named plugin.
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            timestamp_ms: None,
            collect_micros: 0,
            values: Vec::new(),
            instances: Vec::new(),
        }
    }

    /// Set the sample timestamp (milliseconds since Unix epoch).
    pub fn timestamp_ms(mut self, ts: u64) -> Self {
        self.timestamp_ms = Some(ts);
        self
    }

    /// Set the collection duration in microseconds.
    pub fn collect_micros(mut self, micros: u64) -> Self {
        self.collect_micros = micros;
        self
    }

    /// Add a top-level field/value pair.
    pub fn field(mut self, field: impl Into<String>, kind: FieldKind, value: impl Into<Value>) -> Self {
        self.values.push(FieldValue::new(field, kind, value));
        self
    }

    /// Add a named sub-record built with a closure.
    pub fn instance<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(SubRecordBuilder) -> SubRecordBuilder,
    {
        let sub = f(SubRecordBuilder::new(name)).build();
        self.instances.push(sub);
        self
    }

    /// Build the record.
    ///
    /// Records with any sub-records become [`RecordBody::Instances`];
    /// otherwise the flat pairs are used. Without a timestamp, the current
    /// time is taken (std builds only).
    #[cfg(feature = "std")]
    pub fn build(self) -> StatRecord {
        let timestamp_ms = self.timestamp_ms.unwrap_or_else(current_timestamp_ms);
        self.build_with_timestamp(timestamp_ms)
    }

    /// Build the record with an explicit timestamp (no_std builds).
    #[cfg(not(feature = "std"))]
    pub fn build(self) -> StatRecord {
        let timestamp_ms = self.timestamp_ms.unwrap_or(0);
        self.build_with_timestamp(timestamp_ms)
    }

    fn build_with_timestamp(self, timestamp_ms: u64) -> StatRecord {
        let body = if self.instances.is_empty() {
            RecordBody::Flat(self.values)
        } else {
            RecordBody::Instances(self.instances)
        };

        StatRecord {
            plugin: self.plugin,
            timestamp_ms,
            available: true,
            collect_micros: self.collect_micros,
            body,
        }
    }
}

/// Builder for [`SubRecord`].
#[derive(Debug)]
pub struct SubRecordBuilder {
    name: String,
    values: Vec<FieldValue>,
}

impl SubRecordBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    /// Add a field/value pair to this instance.
    pub fn field(mut self, field: impl Into<String>, kind: FieldKind, value: impl Into<Value>) -> Self {
        self.values.push(FieldValue::new(field, kind, value));
        self
    }

    fn build(self) -> SubRecord {
        SubRecord {
            name: self.name,
            values: self.values,
        }
    }
}

/// Get current timestamp in milliseconds since Unix epoch.
#[cfg(feature = "std")]
pub(crate) fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
