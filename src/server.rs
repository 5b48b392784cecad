//! TCP request/response server for the wire protocol.
//!
//! One newline-delimited JSON [`Request`] per line in, one [`Response`]
//! per line out. Every call is version-checked before it executes.
//! Handlers read only the currently published bundle and the shared
//! history/alert state behind short read locks, so a request is never
//! blocked on an in-flight tick.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use vigil_types::{Call, ErrorCode, Request, Response, PROTOCOL_VERSION};

use crate::agent::AgentHandle;

/// The protocol server, bound to a local address.
pub struct Server {
    listener: TcpListener,
    agent: AgentHandle,
}

impl Server {
    /// Bind to an address. Use port 0 to let the OS pick one.
    pub async fn bind(addr: impl ToSocketAddrs, agent: AgentHandle) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, agent })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and serve connections until the listener fails.
    ///
    /// Each connection runs on its own task; a dropped or misbehaving
    /// connection affects nobody else and never the tick loop.
    pub async fn run(self) -> io::Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let agent = self.agent.clone();
            tokio::spawn(async move {
                debug!(%peer, "client connected");
                if let Err(error) = serve_connection(stream, agent).await {
                    debug!(%peer, %error, "connection closed");
                }
            });
        }
    }

    /// Run the accept loop on a background task.
    pub fn spawn(self) -> ServerHandle {
        match self.local_addr() {
            Ok(addr) => info!(%addr, "protocol server listening"),
            Err(_) => info!("protocol server listening"),
        }
        ServerHandle {
            task: tokio::spawn(self.run()),
        }
    }
}

/// Handle for stopping a spawned server.
pub struct ServerHandle {
    task: JoinHandle<io::Result<()>>,
}

impl ServerHandle {
    /// Stop accepting connections. In-flight connection tasks finish
    /// their current request on their own.
    pub fn stop(self) {
        self.task.abort();
    }
}

async fn serve_connection(stream: TcpStream, agent: AgentHandle) -> io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        // A malformed line gets a typed error; the connection stays open.
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => handle_request(&agent, request),
            Err(error) => Response::error(
                ErrorCode::BadRequest,
                format!("malformed request: {error}"),
            ),
        };

        let mut payload = serde_json::to_vec(&response).map_err(io::Error::from)?;
        payload.push(b'\n');
        write_half.write_all(&payload).await?;
    }
    Ok(())
}

/// Execute one versioned call against the published state.
fn handle_request(agent: &AgentHandle, request: Request) -> Response {
    if !request.version.is_compatible() {
        return Response::error(
            ErrorCode::VersionMismatch,
            format!(
                "server speaks protocol {PROTOCOL_VERSION}.x, caller sent {}",
                request.version
            ),
        );
    }

    match request.call {
        Call::GetBundle => Response::Bundle((*agent.bundle()).clone()),
        Call::GetPlugin { name } => match agent.bundle().get(&name) {
            Some(record) => Response::Record(record.clone()),
            None => Response::error(
                ErrorCode::UnknownPlugin,
                format!("no plugin named {name:?} in the current bundle"),
            ),
        },
        Call::GetHistory {
            plugin,
            field,
            max_points,
        } => Response::History(agent.history(&plugin, &field, max_points)),
        Call::GetAlertLog { since_ms } => Response::AlertLog(agent.alert_log(since_ms)),
        Call::GetLimits => Response::Limits(agent.limits()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_types::ProtocolVersion;

    use crate::agent::Agent;
    use crate::collect::testing::{ScriptedCollector, Step};
    use crate::collect::Registry;
    use crate::config::AgentConfig;

    async fn ticked_handle() -> AgentHandle {
        let mut registry = Registry::new();
        registry.register(Box::new(ScriptedCollector::new(
            "a",
            vec![Step::Value(1.0)],
        )));
        let mut agent = Agent::new(registry, AgentConfig::default()).unwrap();
        let handle = agent.handle();
        agent.tick().await;
        handle
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn version_mismatch_rejected_without_executing() {
        let agent = ticked_handle().await;
        let request = Request {
            version: ProtocolVersion::new(PROTOCOL_VERSION + 1, 0),
            call: Call::GetBundle,
        };

        let Response::Error(error) = handle_request(&agent, request) else {
            panic!("expected an error response");
        };
        assert_eq!(error.code, ErrorCode::VersionMismatch);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn compatible_minor_version_is_served() {
        let agent = ticked_handle().await;
        let request = Request {
            version: ProtocolVersion::new(PROTOCOL_VERSION, 9),
            call: Call::GetBundle,
        };

        let Response::Bundle(bundle) = handle_request(&agent, request) else {
            panic!("expected a bundle response");
        };
        assert_eq!(bundle.sequence, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_plugin_is_a_typed_error() {
        let agent = ticked_handle().await;
        let request = Request::new(Call::GetPlugin {
            name: "ghost".to_string(),
        });

        let Response::Error(error) = handle_request(&agent, request) else {
            panic!("expected an error response");
        };
        assert_eq!(error.code, ErrorCode::UnknownPlugin);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_limits_returns_the_configuration() {
        let agent = ticked_handle().await;
        let Response::Limits(limits) = handle_request(&agent, Request::new(Call::GetLimits))
        else {
            panic!("expected a limits response");
        };
        assert_eq!(limits.min_repeat, AgentConfig::default().limits.min_repeat);
    }
}
