//! Threshold configuration for alert evaluation.

use alloc::collections::BTreeMap;
use alloc::string::String;

use crate::AlertLevel;

/// An enter/exit boundary pair for one severity.
///
/// A key enters the severity when its value reaches `enter` and only
/// leaves it again once the value drops below `exit`. Keeping `exit`
/// below `enter` gives the hysteresis band that prevents flapping.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Band {
    /// Value at which the severity is entered.
    pub enter: f64,
    /// Value below which the severity is left. Must not exceed `enter`.
    pub exit: f64,
}

impl Band {
    /// A band with identical enter and exit boundaries (no hysteresis).
    pub const fn at(boundary: f64) -> Self {
        Self {
            enter: boundary,
            exit: boundary,
        }
    }

    /// A band with distinct enter and exit boundaries.
    pub const fn new(enter: f64, exit: f64) -> Self {
        Self { enter, exit }
    }
}

/// Threshold tuple for one `(plugin, field)` key.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldLimits {
    /// Boundaries for the careful severity.
    pub careful: Band,
    /// Boundaries for the warning severity.
    pub warning: Band,
    /// Boundaries for the critical severity.
    pub critical: Band,
    /// Consecutive qualifying samples required before a transition is
    /// committed. `None` falls back to the evaluator-wide default.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    #[cfg_attr(feature = "serde", serde(default))]
    pub min_repeat: Option<u32>,
}

impl FieldLimits {
    /// Simple ascending limits without hysteresis.
    pub const fn simple(careful: f64, warning: f64, critical: f64) -> Self {
        Self {
            careful: Band::at(careful),
            warning: Band::at(warning),
            critical: Band::at(critical),
            min_repeat: None,
        }
    }

    /// The band for a non-Ok severity.
    pub fn band(&self, level: AlertLevel) -> Option<Band> {
        match level {
            AlertLevel::Ok => None,
            AlertLevel::Careful => Some(self.careful),
            AlertLevel::Warning => Some(self.warning),
            AlertLevel::Critical => Some(self.critical),
        }
    }

    /// Check the tuple for internal consistency.
    ///
    /// Boundaries must ascend with severity, every exit must sit at or
    /// below its enter, and an explicit `min_repeat` must be at least 1.
    /// Invalid tuples are rejected outright, never clamped.
    pub fn validate(&self) -> Result<(), LimitsError> {
        for band in [self.careful, self.warning, self.critical] {
            if !band.enter.is_finite() || !band.exit.is_finite() {
                return Err(LimitsError::NonFiniteBoundary);
            }
            if band.exit > band.enter {
                return Err(LimitsError::ExitAboveEnter);
            }
        }
        if self.careful.enter > self.warning.enter || self.warning.enter > self.critical.enter {
            return Err(LimitsError::UnorderedSeverities);
        }
        if self.min_repeat == Some(0) {
            return Err(LimitsError::ZeroRepeat);
        }
        Ok(())
    }
}

/// Full threshold configuration: a global consecutive-sample default plus
/// per-key tuples.
///
/// Keys are `"plugin.field"`, or `"plugin.instance.field"` for
/// multi-instance plugins.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlertLimits {
    /// Default consecutive qualifying samples before a transition commits.
    pub min_repeat: u32,

    /// Per-key threshold tuples.
    pub fields: BTreeMap<String, FieldLimits>,
}

impl AlertLimits {
    /// Validate the default and every tuple.
    pub fn validate(&self) -> Result<(), LimitsError> {
        if self.min_repeat == 0 {
            return Err(LimitsError::ZeroRepeat);
        }
        for limits in self.fields.values() {
            limits.validate()?;
        }
        Ok(())
    }

    /// Look up the tuple for a key.
    pub fn get(&self, key: &str) -> Option<&FieldLimits> {
        self.fields.get(key)
    }

    /// Effective consecutive-sample requirement for a tuple.
    pub fn repeat_for(&self, limits: &FieldLimits) -> u32 {
        limits.min_repeat.unwrap_or(self.min_repeat)
    }
}

impl Default for AlertLimits {
    fn default() -> Self {
        Self {
            min_repeat: 3,
            fields: BTreeMap::new(),
        }
    }
}

/// Ways a threshold tuple can be malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitsError {
    /// A boundary is NaN or infinite.
    NonFiniteBoundary,
    /// An exit boundary exceeds its enter boundary.
    ExitAboveEnter,
    /// Enter boundaries do not ascend with severity.
    UnorderedSeverities,
    /// A consecutive-sample count of zero was supplied.
    ZeroRepeat,
}

impl core::fmt::Display for LimitsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            LimitsError::NonFiniteBoundary => "threshold boundary is not a finite number",
            LimitsError::ExitAboveEnter => "exit boundary exceeds enter boundary",
            LimitsError::UnorderedSeverities => "enter boundaries must ascend with severity",
            LimitsError::ZeroRepeat => "consecutive-sample count must be at least 1",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LimitsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_limits_validate() {
        let limits = FieldLimits::simple(50.0, 70.0, 90.0);
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn hysteresis_limits_validate() {
        let limits = FieldLimits {
            careful: Band::new(50.0, 45.0),
            warning: Band::new(70.0, 65.0),
            critical: Band::new(90.0, 85.0),
            min_repeat: Some(2),
        };
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn exit_above_enter_rejected() {
        let limits = FieldLimits {
            careful: Band::new(50.0, 55.0),
            warning: Band::at(70.0),
            critical: Band::at(90.0),
            min_repeat: None,
        };
        assert_eq!(limits.validate(), Err(LimitsError::ExitAboveEnter));
    }

    #[test]
    fn unordered_severities_rejected() {
        let limits = FieldLimits::simple(70.0, 50.0, 90.0);
        assert_eq!(limits.validate(), Err(LimitsError::UnorderedSeverities));
    }

    #[test]
    fn zero_repeat_rejected() {
        let mut limits = FieldLimits::simple(50.0, 70.0, 90.0);
        limits.min_repeat = Some(0);
        assert_eq!(limits.validate(), Err(LimitsError::ZeroRepeat));

        let config = AlertLimits {
            min_repeat: 0,
            fields: BTreeMap::new(),
        };
        assert_eq!(config.validate(), Err(LimitsError::ZeroRepeat));
    }

    #[test]
    fn nan_boundary_rejected() {
        let limits = FieldLimits::simple(f64::NAN, 70.0, 90.0);
        assert_eq!(limits.validate(), Err(LimitsError::NonFiniteBoundary));
    }

    #[test]
    fn repeat_falls_back_to_default() {
        let config = AlertLimits::default();
        let explicit = FieldLimits {
            min_repeat: Some(5),
            ..FieldLimits::simple(50.0, 70.0, 90.0)
        };
        let implicit = FieldLimits::simple(50.0, 70.0, 90.0);

        assert_eq!(config.repeat_for(&explicit), 5);
        assert_eq!(config.repeat_for(&implicit), 3);
    }

    #[test]
    fn band_lookup_by_level() {
        let limits = FieldLimits::simple(50.0, 70.0, 90.0);
        assert_eq!(limits.band(AlertLevel::Ok), None);
        assert_eq!(limits.band(AlertLevel::Critical), Some(Band::at(90.0)));
    }
}
