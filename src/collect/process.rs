//! Top-processes collector.
//!
//! Reports the heaviest processes by a configurable sort key, bounded by
//! a configurable count, with an optional regex filter on the process
//! name. The first instance, `totals`, carries the aggregate process
//! count; the remaining instances are keyed by pid.

use regex::Regex;
use sysinfo::System;
use vigil_types::{FieldKind, FieldSpec, StatRecord, SubRecordBuilder};

use super::{now_ms, Collector};
use crate::error::CollectorError;

const FIELDS: &[FieldSpec] = &[
    FieldSpec::new("count", "", FieldKind::Scalar),
    FieldSpec::new("name", "", FieldKind::Text),
    FieldSpec::new("cpu_percent", "%", FieldKind::Percent),
    FieldSpec::new("memory_bytes", "B", FieldKind::Scalar),
    FieldSpec::new("memory_percent", "%", FieldKind::Percent),
];

/// Sort key for the process list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessSort {
    /// Heaviest CPU consumers first.
    #[default]
    Cpu,
    /// Largest resident memory first.
    Memory,
    /// Alphabetical by process name.
    Name,
}

/// Samples the process table and reports the top entries.
///
/// CPU percentages are derived from the change since the previous
/// refresh, so the first tick reports 0% for every process.
pub struct ProcessCollector {
    system: System,
    sort: ProcessSort,
    limit: usize,
    filter: Option<Regex>,
}

impl ProcessCollector {
    /// Top 10 processes by CPU, unfiltered.
    pub fn new() -> Self {
        Self::with_options(ProcessSort::Cpu, 10, None)
    }

    /// Create the collector with an explicit sort key, bound and filter.
    pub fn with_options(sort: ProcessSort, limit: usize, filter: Option<Regex>) -> Self {
        Self {
            system: System::new(),
            sort,
            limit,
            filter,
        }
    }
}

impl Default for ProcessCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for ProcessCollector {
    fn name(&self) -> &'static str {
        "process"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        FIELDS
    }

    fn refresh(&mut self, _previous: Option<&StatRecord>) -> Result<StatRecord, CollectorError> {
        self.system.refresh_processes();
        self.system.refresh_memory();

        let total_memory = self.system.total_memory();
        let mut processes: Vec<_> = self
            .system
            .processes()
            .iter()
            .filter(|(_, p)| {
                self.filter
                    .as_ref()
                    .map(|f| f.is_match(p.name()))
                    .unwrap_or(true)
            })
            .collect();
        let count = processes.len() as u64;

        match self.sort {
            ProcessSort::Cpu => {
                processes.sort_by(|(_, a), (_, b)| b.cpu_usage().total_cmp(&a.cpu_usage()));
            }
            ProcessSort::Memory => {
                processes.sort_by(|(_, a), (_, b)| b.memory().cmp(&a.memory()));
            }
            ProcessSort::Name => {
                processes.sort_by(|(_, a), (_, b)| a.name().cmp(b.name()));
            }
        }
        processes.truncate(self.limit);

        let mut builder = StatRecord::builder(self.name())
            .timestamp_ms(now_ms())
            .instance("totals", |i| i.field("count", FieldKind::Scalar, count));

        for (pid, process) in processes {
            let memory = process.memory();
            let memory_percent = if total_memory == 0 {
                0.0
            } else {
                memory as f64 * 100.0 / total_memory as f64
            };
            let name = process.name().to_string();
            let cpu = f64::from(process.cpu_usage());

            builder = builder.instance(pid.to_string(), move |i: SubRecordBuilder| {
                i.field("name", FieldKind::Text, name)
                    .field("cpu_percent", FieldKind::Percent, cpu)
                    .field("memory_bytes", FieldKind::Scalar, memory)
                    .field("memory_percent", FieldKind::Percent, memory_percent)
            });
        }

        Ok(builder.build())
    }
}
