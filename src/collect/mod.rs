//! Collector abstraction and the built-in system collectors.
//!
//! A collector is an independent plugin producing one [`StatRecord`] per
//! refresh tick. Collectors share no state with each other; a collector
//! that computes rates receives only its own previous record to
//! difference against.

mod cpu;
mod disk;
mod memory;
mod network;
mod process;
mod sensors;

pub use cpu::CpuCollector;
pub use disk::DiskCollector;
pub use memory::MemoryCollector;
pub use network::NetworkCollector;
pub use process::{ProcessCollector, ProcessSort};
pub use sensors::SensorCollector;

use std::sync::Arc;

use parking_lot::Mutex;
use vigil_types::{FieldSpec, StatRecord};

use crate::error::CollectorError;

/// An independent metric collector.
///
/// `refresh` is called once per tick from a blocking context and must
/// complete within the orchestrator's per-plugin timeout; a collector
/// that overruns contributes a stale record for that tick.
pub trait Collector: Send {
    /// Stable plugin name used as the record key.
    fn name(&self) -> &'static str;

    /// The static field schema this collector reports.
    ///
    /// Declared once; immutable for the lifetime of the registration.
    fn fields(&self) -> &'static [FieldSpec];

    /// Produce this tick's record.
    ///
    /// `previous` is this collector's own last available record, or `None`
    /// on the first tick and after a re-enable. Rate fields must
    /// difference their raw counters against `previous` and the elapsed
    /// wall-clock time between the two records' timestamps; without a
    /// previous record the raw cumulative value is reported as a scalar.
    fn refresh(&mut self, previous: Option<&StatRecord>) -> Result<StatRecord, CollectorError>;
}

/// A registered collector, shared between the orchestrator and the
/// blocking tasks that drive refreshes.
#[derive(Clone)]
pub struct Registered {
    name: &'static str,
    fields: &'static [FieldSpec],
    collector: Arc<Mutex<Box<dyn Collector>>>,
}

impl Registered {
    /// The collector's plugin name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The collector's declared field schema.
    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Handle for driving a refresh from a blocking task.
    pub(crate) fn collector(&self) -> Arc<Mutex<Box<dyn Collector>>> {
        Arc::clone(&self.collector)
    }
}

impl std::fmt::Debug for Registered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registered").field("name", &self.name).finish()
    }
}

/// The explicit collector registry, built once at startup.
///
/// Registration order is preserved: bundles and refresh scheduling follow
/// the order collectors were added.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<Registered>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry of built-in system collectors.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CpuCollector::new()));
        registry.register(Box::new(MemoryCollector::new()));
        registry.register(Box::new(NetworkCollector::new()));
        registry.register(Box::new(DiskCollector::new()));
        registry.register(Box::new(ProcessCollector::new()));
        registry.register(Box::new(SensorCollector::new()));
        registry
    }

    /// Add a collector. Names must be unique; a duplicate replaces the
    /// earlier registration.
    pub fn register(&mut self, collector: Box<dyn Collector>) {
        let name = collector.name();
        let fields = collector.fields();
        let entry = Registered {
            name,
            fields,
            collector: Arc::new(Mutex::new(collector)),
        };

        if let Some(existing) = self.entries.iter_mut().find(|e| e.name == name) {
            *existing = entry;
        } else {
            self.entries.push(entry);
        }
    }

    /// Registered collectors in registration order.
    pub fn entries(&self) -> &[Registered] {
        &self.entries
    }

    /// Look up a registration by plugin name.
    pub fn get(&self, name: &str) -> Option<&Registered> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Number of registered collectors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Current Unix timestamp in milliseconds.
pub(crate) fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Compute a per-second rate from two cumulative counter samples.
///
/// Returns `None` when the counter went backwards (reset) or when no time
/// elapsed between the samples.
pub(crate) fn rate_between(current: u64, previous: u64, elapsed_ms: u64) -> Option<f64> {
    if current < previous || elapsed_ms == 0 {
        return None;
    }
    Some((current - previous) as f64 * 1000.0 / elapsed_ms as f64)
}
