//! Per-filesystem space usage collector.

use sysinfo::Disks;
use vigil_types::{FieldKind, FieldSpec, StatRecord};

use super::{now_ms, Collector};
use crate::error::CollectorError;

const FIELDS: &[FieldSpec] = &[
    FieldSpec::new("total", "B", FieldKind::Scalar),
    FieldSpec::new("used", "B", FieldKind::Scalar),
    FieldSpec::new("available", "B", FieldKind::Scalar),
    FieldSpec::new("used_percent", "%", FieldKind::Percent),
    FieldSpec::new("filesystem", "", FieldKind::Text),
];

/// Samples space usage for every mounted filesystem.
///
/// Instances are keyed by mount point, so the same device mounted twice
/// reports twice. Mounts are re-enumerated each tick; a filesystem
/// mounted between ticks appears on the next refresh.
pub struct DiskCollector {
    disks: Disks,
}

impl DiskCollector {
    /// Create the collector with an empty mount list.
    pub fn new() -> Self {
        Self {
            disks: Disks::new(),
        }
    }
}

impl Default for DiskCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for DiskCollector {
    fn name(&self) -> &'static str {
        "fs"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        FIELDS
    }

    fn refresh(&mut self, _previous: Option<&StatRecord>) -> Result<StatRecord, CollectorError> {
        self.disks.refresh_list();

        let mut builder = StatRecord::builder(self.name()).timestamp_ms(now_ms());

        let mut disks: Vec<_> = self.disks.iter().collect();
        disks.sort_by_key(|d| d.mount_point().to_path_buf());

        for disk in disks {
            let total = disk.total_space();
            let available = disk.available_space();
            let used = total.saturating_sub(available);
            let used_percent = if total == 0 {
                0.0
            } else {
                used as f64 * 100.0 / total as f64
            };
            let mount = disk.mount_point().to_string_lossy().into_owned();
            let filesystem = disk.file_system().to_string_lossy().into_owned();

            builder = builder.instance(mount, |i| {
                i.field("total", FieldKind::Scalar, total)
                    .field("used", FieldKind::Scalar, used)
                    .field("available", FieldKind::Scalar, available)
                    .field("used_percent", FieldKind::Percent, used_percent)
                    .field("filesystem", FieldKind::Text, filesystem)
            });
        }

        Ok(builder.build())
    }
}
