//! Wire protocol types for the agent's request/response interface.
//!
//! The transport is newline-delimited JSON over TCP: a client writes one
//! serialized [`Request`] per line and reads back one [`Response`] per
//! line. Payloads are field-name keyed and self-describing, so older
//! clients degrade gracefully to the fields they recognize.

use alloc::string::String;
use alloc::vec::Vec;

use crate::{AlertLimits, AlertLogEntry, ProtocolVersion, StatRecord, StatsBundle};

/// One timestamped sample in a field's history.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HistoryPoint {
    /// Unix timestamp in milliseconds of the tick the sample was taken.
    pub timestamp_ms: u64,
    /// Sampled numeric value.
    pub value: f64,
}

impl HistoryPoint {
    /// Create a history point.
    pub const fn new(timestamp_ms: u64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

/// The calls a client can make.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "call", rename_all = "snake_case"))]
pub enum Call {
    /// Fetch the currently published bundle.
    GetBundle,
    /// Fetch a single plugin's latest record.
    GetPlugin {
        /// Plugin name.
        name: String,
    },
    /// Fetch the most recent history for one field.
    GetHistory {
        /// Plugin name.
        plugin: String,
        /// Field key (including the instance name for multi-instance
        /// plugins, e.g. `"eth0.rx_rate"`).
        field: String,
        /// Maximum number of points to return.
        max_points: usize,
    },
    /// Fetch alert log entries.
    GetAlertLog {
        /// Only entries whose state began at or after this timestamp.
        /// `None` returns the full retained log.
        #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
        #[cfg_attr(feature = "serde", serde(default))]
        since_ms: Option<u64>,
    },
    /// Fetch the current threshold configuration.
    GetLimits,
}

/// A versioned request.
///
/// The server checks `version` before executing any call; a major-version
/// mismatch fails the call with [`ErrorCode::VersionMismatch`] without
/// executing it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Request {
    /// Caller's protocol version.
    pub version: ProtocolVersion,
    /// The call to execute.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub call: Call,
}

impl Request {
    /// Build a request at the current protocol version.
    pub fn new(call: Call) -> Self {
        Self {
            version: ProtocolVersion::current(),
            call,
        }
    }
}

/// Typed error codes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ErrorCode {
    /// Caller's protocol major version does not match the server's.
    VersionMismatch,
    /// The named plugin is not registered.
    UnknownPlugin,
    /// The request could not be parsed.
    BadRequest,
    /// The server failed internally while serving the call.
    Internal,
}

/// A typed wire error.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WireError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable detail.
    pub message: String,
}

impl WireError {
    /// Create a wire error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl core::fmt::Display for WireError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

/// A response to one [`Request`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "kind", content = "body", rename_all = "snake_case")
)]
pub enum Response {
    /// The currently published bundle.
    Bundle(StatsBundle),
    /// A single plugin's latest record.
    Record(StatRecord),
    /// History points in chronological order.
    History(Vec<HistoryPoint>),
    /// Alert log entries in commit order.
    AlertLog(Vec<AlertLogEntry>),
    /// The current threshold configuration.
    Limits(AlertLimits),
    /// The call failed.
    Error(WireError),
}

impl Response {
    /// Shorthand for an error response.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Response::Error(WireError::new(code, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "serde")]
    #[test]
    fn request_wire_form_is_flat() {
        let request = Request::new(Call::GetPlugin {
            name: String::from("cpu"),
        });
        let json = serde_json::to_string(&request).unwrap();

        // Version and call share one object so a single line carries both.
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"call\":\"get_plugin\""));
        assert!(json.contains("\"name\":\"cpu\""));

        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn get_alert_log_since_is_optional() {
        let parsed: Request =
            serde_json::from_str(r#"{"version":{"major":1,"minor":0},"call":"get_alert_log"}"#)
                .unwrap();
        assert_eq!(parsed.call, Call::GetAlertLog { since_ms: None });
    }

    #[cfg(feature = "serde")]
    #[test]
    fn response_roundtrip() {
        let response = Response::History(alloc::vec![
            HistoryPoint::new(1000, 1.0),
            HistoryPoint::new(2000, 2.0),
        ]);
        let json = serde_json::to_string(&response).unwrap();
        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, response);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn error_response_carries_code() {
        let response = Response::error(ErrorCode::VersionMismatch, "server speaks 1.x");
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("version_mismatch"));

        let Response::Error(err) = serde_json::from_str::<Response>(&json).unwrap() else {
            panic!("expected error response");
        };
        assert_eq!(err.code, ErrorCode::VersionMismatch);
    }

    #[test]
    fn request_defaults_to_current_version() {
        let request = Request::new(Call::GetBundle);
        assert!(request.version.is_compatible());
    }
}
