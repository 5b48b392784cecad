//! Error taxonomy for the agent core.
//!
//! Nothing in this module is permitted to terminate the tick loop: plugin
//! failures are isolated per tick, protocol and network failures are
//! surfaced to the affected caller only, and configuration errors are
//! rejected before the agent starts.

use thiserror::Error;
use vigil_types::{LimitsError, ProtocolVersion, WireError};

/// A collector failed to produce a record this tick.
///
/// Isolated and non-fatal: the orchestrator logs the failure, republishes
/// the previous record marked stale, and carries on with the other
/// plugins.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Reading an OS source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A raw value could not be interpreted.
    #[error("failed to parse source data: {0}")]
    Parse(String),

    /// The backing source is missing on this platform or at this moment.
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Invalid configuration, rejected at load time.
///
/// Values are never silently clamped; the caller gets the reason and must
/// supply a valid value.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The tick interval must be positive.
    #[error("tick interval must be greater than zero")]
    ZeroInterval,

    /// The per-plugin refresh timeout must be positive.
    #[error("plugin timeout must be greater than zero")]
    ZeroTimeout,

    /// History ring capacity must hold at least one entry.
    #[error("history capacity must be at least 1 (plugin: {0})")]
    ZeroCapacity(String),

    /// A threshold tuple is malformed.
    #[error("invalid thresholds for {key}: {source}")]
    InvalidLimits {
        /// The `plugin.field` key the tuple was configured for.
        key: String,
        /// The underlying validation failure.
        source: LimitsError,
    },

    /// A plugin name in the configuration matches no registered collector.
    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),
}

/// A client-side sync failure.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connecting, reading, or writing failed.
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The server rejected our protocol version.
    #[error("protocol version mismatch: {0}")]
    VersionMismatch(String),

    /// The server's bundle carries a version we cannot interpret.
    #[error("incompatible bundle version {0}")]
    IncompatibleBundle(ProtocolVersion),

    /// The response could not be parsed.
    #[error("malformed response: {0}")]
    Parse(String),

    /// The server returned a typed error.
    #[error("server error: {0}")]
    Remote(WireError),

    /// The server closed the connection without responding.
    #[error("connection closed before response")]
    ConnectionClosed,
}
