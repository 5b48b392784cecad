//! Configuration surface consumed by the agent core.
//!
//! Loading (files, CLI flags) happens outside the core; this module only
//! defines the values the core accepts and validates them. Invalid values
//! are rejected with [`ConfigError`], never silently clamped.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use anyhow::{bail, Result};
use serde::Deserialize;
use vigil_types::AlertLimits;

use crate::error::ConfigError;

/// History ring sizing: a global default plus per-plugin overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Ring capacity applied to every plugin without an override.
    pub capacity: usize,

    /// Per-plugin capacity overrides, keyed by plugin name.
    pub per_plugin: BTreeMap<String, usize>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 60,
            per_plugin: BTreeMap::new(),
        }
    }
}

impl HistoryConfig {
    /// Effective capacity for a plugin.
    pub fn capacity_for(&self, plugin: &str) -> usize {
        self.per_plugin.get(plugin).copied().unwrap_or(self.capacity)
    }
}

/// Full configuration for the agent core.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Interval between collection ticks.
    #[serde(with = "duration_str")]
    pub tick_interval: Duration,

    /// Per-plugin refresh timeout. A plugin exceeding this contributes a
    /// stale record for the tick without delaying the others further.
    #[serde(with = "duration_str")]
    pub plugin_timeout: Duration,

    /// Plugins disabled at startup. They can be re-enabled between ticks.
    pub disabled_plugins: BTreeSet<String>,

    /// History ring sizing.
    pub history: HistoryConfig,

    /// Alert threshold configuration.
    pub limits: AlertLimits,

    /// Maximum alert log entries retained in memory; the oldest entry is
    /// evicted once exceeded.
    pub alert_log_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(3),
            plugin_timeout: Duration::from_secs(2),
            disabled_plugins: BTreeSet::new(),
            history: HistoryConfig::default(),
            limits: AlertLimits::default(),
            alert_log_capacity: 1000,
        }
    }
}

impl AgentConfig {
    /// Validate every configured value.
    ///
    /// Called once before the orchestrator starts; a failure here means
    /// the agent refuses to run rather than running with surprising
    /// values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.plugin_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.history.capacity == 0 {
            return Err(ConfigError::ZeroCapacity("<default>".to_string()));
        }
        for (plugin, capacity) in &self.history.per_plugin {
            if *capacity == 0 {
                return Err(ConfigError::ZeroCapacity(plugin.clone()));
            }
        }
        if self.alert_log_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("<alert log>".to_string()));
        }
        self.limits.validate().map_err(|source| {
            let key = self
                .limits
                .fields
                .iter()
                .find(|(_, l)| l.validate().is_err())
                .map(|(k, _)| k.clone())
                .unwrap_or_else(|| "<default>".to_string());
            ConfigError::InvalidLimits { key, source }
        })?;
        Ok(())
    }
}

/// Parse duration strings like "3s", "500ms", "29.99s".
pub fn parse_duration(s: &str) -> Result<Duration> {
    // Suffix to nanoseconds multiplier (order matters: longer suffixes first)
    const UNITS: &[(&str, f64)] = &[
        ("ns", 1.0),
        ("µs", 1_000.0),
        ("us", 1_000.0),
        ("ms", 1_000_000.0),
        ("s", 1_000_000_000.0),
    ];

    let s = s.trim();

    for (suffix, multiplier) in UNITS {
        if let Some(val_str) = s.strip_suffix(suffix) {
            let val: f64 = val_str.parse()?;
            return Ok(Duration::from_nanos((val * multiplier) as u64));
        }
    }

    bail!("Unknown duration format: {}", s)
}

mod duration_str {
    //! Serde helper: durations as human strings ("3s") or raw seconds.

    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Seconds(f64),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => super::parse_duration(&s).map_err(serde::de::Error::custom),
            Repr::Seconds(secs) => Ok(Duration::from_secs_f64(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_types::FieldLimits;

    #[test]
    fn defaults_are_valid() {
        assert!(AgentConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_interval_rejected() {
        let config = AgentConfig {
            tick_interval: Duration::ZERO,
            ..AgentConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroInterval)
        ));
    }

    #[test]
    fn zero_capacity_override_rejected() {
        let mut config = AgentConfig::default();
        config.history.per_plugin.insert("cpu".to_string(), 0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroCapacity(plugin)) if plugin == "cpu"
        ));
    }

    #[test]
    fn invalid_limits_rejected_with_key() {
        let mut config = AgentConfig::default();
        config.limits.fields.insert(
            "mem.used_percent".to_string(),
            FieldLimits::simple(90.0, 70.0, 95.0),
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLimits { key, .. }) if key == "mem.used_percent"
        ));
    }

    #[test]
    fn capacity_override_applies() {
        let mut history = HistoryConfig::default();
        history.per_plugin.insert("net".to_string(), 120);

        assert_eq!(history.capacity_for("net"), 120);
        assert_eq!(history.capacity_for("cpu"), 60);
    }

    #[test]
    fn parse_duration_formats() {
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert!(parse_duration("fast").is_err());
    }

    #[test]
    fn config_deserializes_duration_strings() {
        let config: AgentConfig = serde_json::from_str(
            r#"{"tick_interval": "1s", "plugin_timeout": "250ms"}"#,
        )
        .unwrap();
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.plugin_timeout, Duration::from_millis(250));
    }
}
