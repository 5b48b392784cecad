//! Polling client sync.
//!
//! Polls a remote agent's protocol server on its own interval, caches
//! the last good bundle for display, and tracks connectivity with an
//! explicit state machine: consecutive failures back off exponentially
//! up to a cap, and past a configured threshold the client reports
//! `Disconnected` instead of silently retrying forever. The next
//! successful poll returns it to `Connected` immediately.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use vigil_types::{Call, ErrorCode, Request, Response, StatsBundle};

use crate::collect::now_ms;
use crate::error::ClientError;

/// Tunables for the poll loop.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Interval between successful polls. Independent of the server's
    /// tick interval.
    pub poll_interval: Duration,
    /// Per-request timeout covering connect, write and read.
    pub request_timeout: Duration,
    /// Delay after the first failure; doubles per consecutive failure.
    pub backoff_base: Duration,
    /// Upper bound on the backoff delay.
    pub backoff_cap: Duration,
    /// Consecutive failures before the status turns `Disconnected`.
    pub disconnect_after: u32,
    /// Age past which the cached bundle is considered stale.
    pub stale_after: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(2),
            backoff_base: Duration::from_millis(500),
            backoff_cap: Duration::from_secs(30),
            disconnect_after: 3,
            stale_after: Duration::from_secs(10),
        }
    }
}

/// Connectivity as surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// No successful poll yet, or the failure threshold was crossed.
    #[default]
    Disconnected,
    /// The last poll succeeded, or failures are still under the
    /// threshold.
    Connected,
}

/// The last good bundle together with when it was fetched.
#[derive(Debug, Clone)]
pub struct CachedBundle {
    /// The bundle as received.
    pub bundle: Arc<StatsBundle>,
    /// Unix milliseconds when the poll that fetched it succeeded.
    pub fetched_ms: u64,
}

impl CachedBundle {
    /// Whether the cache is older than the configured staleness bound.
    pub fn is_stale(&self, stale_after: Duration) -> bool {
        let age_ms = now_ms().saturating_sub(self.fetched_ms);
        Duration::from_millis(age_ms) > stale_after
    }
}

/// Connectivity state machine, separated from I/O so transitions are
/// directly testable.
#[derive(Debug, Default)]
struct SyncState {
    status: SyncStatus,
    failures: u32,
    cached: Option<CachedBundle>,
}

impl SyncState {
    fn record_success(&mut self, bundle: Arc<StatsBundle>, fetched_ms: u64) {
        self.status = SyncStatus::Connected;
        self.failures = 0;
        self.cached = Some(CachedBundle { bundle, fetched_ms });
    }

    /// Count a failure; the cached bundle is retained for display.
    fn record_failure(&mut self, disconnect_after: u32) {
        self.failures = self.failures.saturating_add(1);
        if self.failures >= disconnect_after {
            self.status = SyncStatus::Disconnected;
        }
    }
}

/// Delay before the next retry after `failures` consecutive failures.
fn backoff_delay(failures: u32, base: Duration, cap: Duration) -> Duration {
    let exponent = failures.saturating_sub(1).min(16);
    cap.min(base.saturating_mul(1u32 << exponent))
}

/// A polling consumer of a remote agent.
#[derive(Clone)]
pub struct SyncClient {
    addr: String,
    config: ClientConfig,
    state: Arc<RwLock<SyncState>>,
}

impl SyncClient {
    /// Create a client for the given `host:port`.
    pub fn new(addr: impl Into<String>, config: ClientConfig) -> Self {
        Self {
            addr: addr.into(),
            config,
            state: Arc::new(RwLock::new(SyncState::default())),
        }
    }

    /// Current connectivity status.
    pub fn status(&self) -> SyncStatus {
        self.state.read().status
    }

    /// Consecutive failures since the last successful poll.
    pub fn failures(&self) -> u32 {
        self.state.read().failures
    }

    /// The last good bundle, if any poll has ever succeeded.
    ///
    /// Check [`CachedBundle::is_stale`] against the configured bound
    /// before trusting it for display.
    pub fn cached(&self) -> Option<CachedBundle> {
        self.state.read().cached.clone()
    }

    /// Delay the poll loop would wait before the next attempt, given the
    /// current failure count.
    pub fn retry_delay(&self) -> Duration {
        let failures = self.failures();
        if failures == 0 {
            self.config.poll_interval
        } else {
            backoff_delay(failures, self.config.backoff_base, self.config.backoff_cap)
        }
    }

    /// Fetch the current bundle once and update the connectivity state.
    pub async fn poll_once(&self) -> Result<Arc<StatsBundle>, ClientError> {
        let was = self.status();
        let outcome = self.fetch_bundle().await;

        match outcome {
            Ok(bundle) => {
                let bundle = Arc::new(bundle);
                self.state
                    .write()
                    .record_success(Arc::clone(&bundle), now_ms());
                if was == SyncStatus::Disconnected {
                    info!(addr = %self.addr, "reconnected");
                }
                Ok(bundle)
            }
            Err(error) => {
                let disconnected = {
                    let mut state = self.state.write();
                    state.record_failure(self.config.disconnect_after);
                    state.status == SyncStatus::Disconnected
                };
                if disconnected && was == SyncStatus::Connected {
                    warn!(addr = %self.addr, failures = self.failures(), "marked disconnected");
                }
                Err(error)
            }
        }
    }

    async fn fetch_bundle(&self) -> Result<StatsBundle, ClientError> {
        match request(&self.addr, Call::GetBundle, self.config.request_timeout).await? {
            Response::Bundle(bundle) => {
                if !bundle.version.is_compatible() {
                    return Err(ClientError::IncompatibleBundle(bundle.version));
                }
                Ok(bundle)
            }
            Response::Error(error) if error.code == ErrorCode::VersionMismatch => {
                Err(ClientError::VersionMismatch(error.message))
            }
            Response::Error(error) => Err(ClientError::Remote(error)),
            other => Err(ClientError::Parse(format!(
                "unexpected response kind: {other:?}"
            ))),
        }
    }

    /// Spawn the poll loop on a background task.
    ///
    /// Each poll is individually bounded by the request timeout; a
    /// cancelled or failed poll never affects the next scheduled one.
    pub fn start(&self) -> SyncHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let client = self.clone();

        tokio::spawn(async move {
            loop {
                match client.poll_once().await {
                    Ok(bundle) => debug!(sequence = bundle.sequence, "poll succeeded"),
                    Err(error) => {
                        debug!(failures = client.failures(), %error, "poll failed")
                    }
                }
                let delay = client.retry_delay();
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("poll loop stopped");
        });

        SyncHandle { stop_tx }
    }
}

/// Handle for stopping a running poll loop.
pub struct SyncHandle {
    stop_tx: watch::Sender<bool>,
}

impl SyncHandle {
    /// Stop polling after the in-flight poll completes.
    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Issue one call against a protocol server and return its response.
///
/// Opens a fresh connection per call; the whole exchange is bounded by
/// `timeout`.
pub async fn request(addr: &str, call: Call, timeout: Duration) -> Result<Response, ClientError> {
    let exchange = async {
        let mut stream = TcpStream::connect(addr).await?;

        let mut line = serde_json::to_string(&Request::new(call))
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        line.push('\n');
        stream.write_all(line.as_bytes()).await?;

        let mut reader = BufReader::new(stream);
        let mut response = String::new();
        if reader.read_line(&mut response).await? == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        serde_json::from_str(&response).map_err(|e| ClientError::Parse(e.to_string()))
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| ClientError::Timeout)?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_respects_the_cap() {
        let base = Duration::from_millis(500);
        let cap = Duration::from_secs(30);

        let delays: Vec<Duration> = (1..=5).map(|f| backoff_delay(f, base, cap)).collect();
        assert_eq!(
            delays,
            [
                Duration::from_millis(500),
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
        // Five consecutive failures never exceed the cap, and neither
        // does any later retry.
        assert!(delays.iter().all(|d| *d <= cap));
        assert_eq!(backoff_delay(30, base, cap), cap);
    }

    #[test]
    fn disconnects_after_threshold_and_reconnects_immediately() {
        let mut state = SyncState::default();
        assert_eq!(state.status, SyncStatus::Disconnected);

        let bundle = Arc::new(StatsBundle::empty());
        state.record_success(Arc::clone(&bundle), 1000);
        assert_eq!(state.status, SyncStatus::Connected);

        // Two failures under a threshold of three: still connected,
        // cache retained.
        state.record_failure(3);
        state.record_failure(3);
        assert_eq!(state.status, SyncStatus::Connected);
        assert!(state.cached.is_some());

        state.record_failure(3);
        assert_eq!(state.status, SyncStatus::Disconnected);
        assert_eq!(state.failures, 3);
        assert!(state.cached.is_some(), "cache survives disconnection");

        state.record_success(bundle, 2000);
        assert_eq!(state.status, SyncStatus::Connected);
        assert_eq!(state.failures, 0);
    }

    #[test]
    fn cached_bundle_staleness() {
        let fresh = CachedBundle {
            bundle: Arc::new(StatsBundle::empty()),
            fetched_ms: now_ms(),
        };
        assert!(!fresh.is_stale(Duration::from_secs(10)));

        let old = CachedBundle {
            bundle: Arc::new(StatsBundle::empty()),
            fetched_ms: now_ms().saturating_sub(60_000),
        };
        assert!(old.is_stale(Duration::from_secs(10)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn poll_against_a_dead_address_counts_failures() {
        // Port 1 on localhost refuses connections.
        let client = SyncClient::new(
            "127.0.0.1:1",
            ClientConfig {
                request_timeout: Duration::from_millis(500),
                disconnect_after: 2,
                ..ClientConfig::default()
            },
        );

        assert!(client.poll_once().await.is_err());
        assert_eq!(client.failures(), 1);
        assert_eq!(client.status(), SyncStatus::Disconnected); // never connected

        assert!(client.poll_once().await.is_err());
        assert_eq!(client.failures(), 2);
        assert!(client.cached().is_none());
    }
}
