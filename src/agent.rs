//! The tick orchestrator.
//!
//! One tick runs through `Collecting` (every enabled collector refreshes
//! independently, bounded by the per-plugin timeout), `Aggregating` (the
//! results become a new immutable [`StatsBundle`], fed to the history
//! buffer and the alert evaluator) and `Published` (a single write of the
//! shared bundle reference replaces the previous bundle). Readers clone
//! the current `Arc` and never observe a half-built bundle.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, warn};
use vigil_types::{AlertLimits, AlertLogEntry, HistoryPoint, StatRecord, StatsBundle};

use crate::alert::AlertEvaluator;
use crate::collect::{now_ms, Registered, Registry};
use crate::config::AgentConfig;
use crate::error::ConfigError;
use crate::history::HistoryBuffer;

/// State shared between the tick loop and concurrent readers.
///
/// The bundle reference is the only value the tick loop and request
/// handlers both touch every tick; history, alerts and the disabled set
/// are behind their own locks so a slow reader never delays a publish.
struct Shared {
    bundle: RwLock<Arc<StatsBundle>>,
    history: RwLock<HistoryBuffer>,
    alerts: RwLock<AlertEvaluator>,
    disabled: RwLock<BTreeSet<String>>,
}

/// Read-side handle to a running (or manually ticked) agent.
///
/// Cheap to clone; the server protocol holds one per connection task.
/// Every accessor takes a short read lock and never waits on an
/// in-flight tick.
#[derive(Clone)]
pub struct AgentHandle {
    shared: Arc<Shared>,
}

impl AgentHandle {
    /// The currently published bundle.
    pub fn bundle(&self) -> Arc<StatsBundle> {
        Arc::clone(&self.shared.bundle.read())
    }

    /// The most recent `max_points` history samples for a field, in
    /// chronological order.
    pub fn history(&self, plugin: &str, field: &str, max_points: usize) -> Vec<HistoryPoint> {
        self.shared.history.read().query(plugin, field, max_points)
    }

    /// Alert log entries whose state began at or after `since_ms`.
    pub fn alert_log(&self, since_ms: Option<u64>) -> Vec<AlertLogEntry> {
        self.shared.alerts.read().log_since(since_ms)
    }

    /// The active threshold configuration.
    pub fn limits(&self) -> AlertLimits {
        self.shared.alerts.read().limits().clone()
    }

    /// Enable or disable a plugin. Takes effect at the next tick; a
    /// re-enabled plugin starts over without a previous record, so its
    /// rate fields reappear only from its second successful refresh.
    pub fn set_enabled(&self, plugin: &str, enabled: bool) {
        let mut disabled = self.shared.disabled.write();
        if enabled {
            disabled.remove(plugin);
        } else {
            disabled.insert(plugin.to_string());
        }
    }

    /// Whether a plugin will be refreshed next tick.
    pub fn is_enabled(&self, plugin: &str) -> bool {
        !self.shared.disabled.read().contains(plugin)
    }
}

/// The orchestrator: owns the collector registry and drives the refresh
/// loop.
///
/// Construct with [`Agent::new`], grab an [`AgentHandle`] for readers,
/// then either call [`Agent::tick`] manually or hand the agent to
/// [`Agent::start`] to run on the configured cadence.
pub struct Agent {
    registry: Registry,
    config: AgentConfig,
    shared: Arc<Shared>,
    /// Last available record per plugin, threaded back into the next
    /// refresh for rate computation and reused as the stale body when a
    /// refresh fails.
    previous: HashMap<String, StatRecord>,
    sequence: u64,
    last_timestamp_ms: u64,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("config", &self.config)
            .field("sequence", &self.sequence)
            .field("last_timestamp_ms", &self.last_timestamp_ms)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Create an agent over a registry.
    ///
    /// The configuration is validated up front; invalid values are
    /// rejected here rather than silently clamped.
    pub fn new(registry: Registry, config: AgentConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        for name in &config.disabled_plugins {
            if registry.get(name).is_none() {
                return Err(ConfigError::UnknownPlugin(name.clone()));
            }
        }

        let shared = Arc::new(Shared {
            bundle: RwLock::new(Arc::new(StatsBundle::empty())),
            history: RwLock::new(HistoryBuffer::new(config.history.clone())),
            alerts: RwLock::new(AlertEvaluator::new(
                config.limits.clone(),
                config.alert_log_capacity,
            )),
            disabled: RwLock::new(config.disabled_plugins.clone()),
        });

        Ok(Self {
            registry,
            config,
            shared,
            previous: HashMap::new(),
            sequence: 0,
            last_timestamp_ms: 0,
        })
    }

    /// A read-side handle for servers, exporters and tests.
    pub fn handle(&self) -> AgentHandle {
        AgentHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run one full tick: collect, aggregate, publish.
    pub async fn tick(&mut self) {
        // Collecting: refresh every enabled collector concurrently. A
        // disabled plugin loses its previous record so a later re-enable
        // starts over like a first tick; its history is kept.
        let disabled = self.shared.disabled.read().clone();
        let enabled: Vec<Registered> = self
            .registry
            .entries()
            .iter()
            .filter(|e| !disabled.contains(e.name()))
            .cloned()
            .collect();
        for name in &disabled {
            self.previous.remove(name.as_str());
        }

        let timeout = self.config.plugin_timeout;
        let refreshes = enabled.iter().map(|entry| {
            let collector = entry.collector();
            let previous = self.previous.get(entry.name()).cloned();
            let name = entry.name();
            async move {
                let started = Instant::now();
                let outcome = tokio::time::timeout(
                    timeout,
                    tokio::task::spawn_blocking(move || {
                        collector.lock().refresh(previous.as_ref())
                    }),
                )
                .await;
                (name, started.elapsed(), outcome)
            }
        });
        let outcomes = futures_util::future::join_all(refreshes).await;

        // Aggregating: assemble the new bundle. The bundle timestamp never
        // goes backwards even if the wall clock does.
        let timestamp_ms = now_ms().max(self.last_timestamp_ms);
        let mut records = BTreeMap::new();
        for (name, took, outcome) in outcomes {
            let record = match outcome {
                Ok(Ok(Ok(mut record))) => {
                    record.collect_micros = took.as_micros() as u64;
                    self.previous.insert(name.to_string(), record.clone());
                    record
                }
                Ok(Ok(Err(err))) => {
                    warn!(plugin = name, error = %err, "collection failed");
                    self.stale_record(name, timestamp_ms)
                }
                Ok(Err(join_err)) => {
                    warn!(plugin = name, error = %join_err, "collection task panicked");
                    self.stale_record(name, timestamp_ms)
                }
                Err(_) => {
                    warn!(plugin = name, ?timeout, "collection timed out");
                    self.stale_record(name, timestamp_ms)
                }
            };
            records.insert(name.to_string(), record);
        }

        self.sequence += 1;
        self.last_timestamp_ms = timestamp_ms;
        let bundle = Arc::new(StatsBundle::new(self.sequence, timestamp_ms, records));

        {
            let mut history = self.shared.history.write();
            for record in bundle.records.values().filter(|r| r.available) {
                history.record_tick(record);
            }
        }
        let transitions = self.shared.alerts.write().evaluate(&bundle);
        if !transitions.is_empty() {
            debug!(count = transitions.len(), "alert transitions committed");
        }

        // Published: one reference swap; readers see the old bundle or
        // this one, never a mix.
        *self.shared.bundle.write() = bundle;
    }

    fn stale_record(&self, plugin: &str, timestamp_ms: u64) -> StatRecord {
        match self.previous.get(plugin) {
            Some(previous) => StatRecord::stale(previous, timestamp_ms),
            None => StatRecord::empty(plugin, timestamp_ms),
        }
    }

    /// Spawn the tick loop on the configured interval.
    ///
    /// Take an [`AgentHandle`] before calling this; the agent itself
    /// moves into the background task. A tick that overruns the interval
    /// is logged and the next one starts immediately; ticks never run
    /// concurrently.
    pub fn start(self) -> TickerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(run_loop(self, stop_rx));
        TickerHandle { stop_tx }
    }
}

async fn run_loop(mut agent: Agent, mut stop_rx: watch::Receiver<bool>) {
    let interval = agent.config.tick_interval;
    loop {
        let started = Instant::now();
        agent.tick().await;
        let elapsed = started.elapsed();

        if elapsed >= interval {
            warn!(?elapsed, ?interval, "tick overran the interval");
            if *stop_rx.borrow() {
                break;
            }
            continue;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval - elapsed) => {}
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    break;
                }
            }
        }
    }
    debug!("tick loop stopped");
}

/// Handle for stopping a running tick loop.
pub struct TickerHandle {
    stop_tx: watch::Sender<bool>,
}

impl TickerHandle {
    /// Stop the tick loop after the in-flight tick completes.
    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
    }
}
