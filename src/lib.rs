//! # vigil
//!
//! Runtime core of a cross-platform resource-monitoring agent: pluggable
//! system collectors on a fixed cadence, bounded in-memory history,
//! threshold alerts with hysteresis, and a polling wire protocol for
//! remote consumers.
//!
//! ## Architecture
//!
//! Data flows one way per tick:
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────┐ ┌────────┐
//! │ collect  │──▶│    agent     │──▶│ history │ │ alert  │
//! │ (plugins)│   │ (tick loop)  │   └─────────┘ └────────┘
//! └──────────┘   └──────┬───────┘
//!                       ▼ atomic publish
//!                ┌─────────────┐    ┌────────┐    ┌──────────┐
//!                │ StatsBundle │───▶│ server │───▶│  client  │
//!                └─────────────┘    └────────┘    └──────────┘
//! ```
//!
//! - **[`collect`]**: the [`Collector`] trait, the explicit [`Registry`],
//!   and the built-in sysinfo-backed collectors (CPU, memory, network,
//!   filesystems, processes, sensors)
//! - **[`agent`]**: the orchestrator - drives refreshes with per-plugin
//!   timeouts, assembles each tick into an immutable bundle, and
//!   publishes it with a single reference swap
//! - **[`history`]**: bounded per-field ring buffers for trend display
//! - **[`alert`]**: threshold evaluation with hysteresis bands,
//!   consecutive-sample damping and an append-only alert log
//! - **[`server`]** / **[`client`]**: newline-delimited JSON over TCP
//!   with a protocol-version check on every call
//!
//! The shared schema (records, bundles, alert entries, wire requests)
//! lives in the `vigil-types` crate so consumers can speak the protocol
//! without pulling in the collection stack.
//!
//! ## Usage
//!
//! ```
//! use vigil::{Agent, AgentConfig, Registry};
//!
//! let agent = Agent::new(Registry::standard(), AgentConfig::default()).unwrap();
//! let handle = agent.handle();
//!
//! // Nothing published before the first tick.
//! assert!(handle.bundle().is_empty());
//! ```
//!
//! Serving the protocol:
//!
//! ```no_run
//! use vigil::{Agent, AgentConfig, Registry, Server};
//!
//! # tokio_test::block_on(async {
//! let agent = Agent::new(Registry::standard(), AgentConfig::default()).unwrap();
//! let handle = agent.handle();
//! let ticker = agent.start();
//!
//! let server = Server::bind("127.0.0.1:9070", handle).await.unwrap();
//! server.run().await.unwrap();
//! # ticker.stop();
//! # });
//! ```

pub mod agent;
pub mod alert;
pub mod client;
pub mod collect;
pub mod config;
pub mod error;
pub mod history;
pub mod server;

// Re-export main types for convenience
pub use agent::{Agent, AgentHandle, TickerHandle};
pub use alert::AlertEvaluator;
pub use client::{ClientConfig, SyncClient, SyncHandle, SyncStatus};
pub use collect::{Collector, Registry};
pub use config::{AgentConfig, HistoryConfig};
pub use error::{ClientError, CollectorError, ConfigError};
pub use history::HistoryBuffer;
pub use server::{Server, ServerHandle};
