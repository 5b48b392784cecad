//! # vigil-types
//!
//! Core types for the vigil resource-monitoring agent. This crate defines
//! the schema shared by the collecting agent, its network protocol, and any
//! consumer rendering or exporting the data.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature when wire encoding is needed
//! - **Self-describing wire format**: Records carry field names and kinds, so older
//!   consumers degrade gracefully to the fields they recognize
//! - **Versioned protocol**: Every request and bundle carries a protocol version
//!
//! ## Features
//!
//! - `std` (default): Standard library support (current-time constructors)
//! - `serde`: JSON serialization via serde
//!
//! ## Example
//!
//! ```rust
//! use vigil_types::{StatRecord, FieldKind, Value};
//!
//! let record = StatRecord::builder("mem")
//!     .timestamp_ms(1703160000000)
//!     .field("total", FieldKind::Scalar, Value::Int(16_000_000_000))
//!     .field("used_percent", FieldKind::Percent, Value::Float(42.5))
//!     .build();
//!
//! assert!(record.available);
//! assert_eq!(record.value("used_percent"), Some(&Value::Float(42.5)));
//! ```
//!
//! ## Protocol Version
//!
//! The current protocol version is **1**. Every call to the agent's server
//! carries the caller's version; a major-version mismatch is rejected before
//! the call executes.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod alert;
mod bundle;
mod field;
mod limits;
mod protocol;
mod record;
mod version;

pub use alert::*;
pub use bundle::*;
pub use field::*;
pub use limits::*;
pub use protocol::*;
pub use record::*;
pub use version::*;

/// Current wire protocol major version.
///
/// Increment this when making breaking changes to the record or request
/// format. The server rejects calls whose major version does not match.
pub const PROTOCOL_VERSION: u32 = 1;
