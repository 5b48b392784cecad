//! Alert states and the append-only alert log.

use alloc::string::String;

/// Severity of a monitored `(plugin, field)` key.
///
/// Ordered so that `max()` picks the most severe state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AlertLevel {
    /// Value within normal bounds.
    #[default]
    Ok,
    /// Value crossed the careful boundary.
    Careful,
    /// Value crossed the warning boundary.
    Warning,
    /// Value crossed the critical boundary.
    Critical,
}

impl AlertLevel {
    /// Short symbol for display and logs.
    pub fn symbol(&self) -> &'static str {
        match self {
            AlertLevel::Ok => "OK",
            AlertLevel::Careful => "CAREFUL",
            AlertLevel::Warning => "WARN",
            AlertLevel::Critical => "CRIT",
        }
    }
}

impl core::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One committed alert-state transition.
///
/// An entry opens when a key transitions into a state and closes when the
/// next transition replaces it. Closed entries are immutable once
/// `end_ms` is set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlertLogEntry {
    /// Plugin part of the key.
    pub plugin: String,

    /// Field part of the key. For multi-instance plugins this includes the
    /// instance name (e.g. `"eth0.rx_rate"`).
    pub field: String,

    /// State the key left.
    pub from: AlertLevel,

    /// State the key entered.
    pub to: AlertLevel,

    /// When the new state was entered (milliseconds since Unix epoch).
    pub start_ms: u64,

    /// When the state was left again, or `None` while still open.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    #[cfg_attr(feature = "serde", serde(default))]
    pub end_ms: Option<u64>,
}

impl AlertLogEntry {
    /// Open a new entry for a transition committed at `start_ms`.
    pub fn open(
        plugin: impl Into<String>,
        field: impl Into<String>,
        from: AlertLevel,
        to: AlertLevel,
        start_ms: u64,
    ) -> Self {
        Self {
            plugin: plugin.into(),
            field: field.into(),
            from,
            to,
            start_ms,
            end_ms: None,
        }
    }

    /// True while the entry's state is still current.
    pub fn is_open(&self) -> bool {
        self.end_ms.is_none()
    }

    /// Close the entry at the given timestamp.
    ///
    /// Closing an already-closed entry is a no-op; closed entries are
    /// immutable.
    pub fn close(&mut self, end_ms: u64) {
        if self.end_ms.is_none() {
            self.end_ms = Some(end_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering() {
        assert!(AlertLevel::Ok < AlertLevel::Careful);
        assert!(AlertLevel::Careful < AlertLevel::Warning);
        assert!(AlertLevel::Warning < AlertLevel::Critical);
        assert_eq!(
            AlertLevel::Warning.max(AlertLevel::Careful),
            AlertLevel::Warning
        );
    }

    #[test]
    fn entry_open_and_close() {
        let mut entry = AlertLogEntry::open("cpu", "user", AlertLevel::Ok, AlertLevel::Warning, 100);
        assert!(entry.is_open());

        entry.close(250);
        assert!(!entry.is_open());
        assert_eq!(entry.end_ms, Some(250));
    }

    #[test]
    fn closed_entries_are_immutable() {
        let mut entry = AlertLogEntry::open("cpu", "user", AlertLevel::Ok, AlertLevel::Warning, 100);
        entry.close(250);
        entry.close(999);
        assert_eq!(entry.end_ms, Some(250));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn open_entry_omits_end() {
        let entry = AlertLogEntry::open("mem", "used_percent", AlertLevel::Ok, AlertLevel::Careful, 5);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("end_ms"));

        let parsed: AlertLogEntry = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_open());
    }
}
