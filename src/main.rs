use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vigil::collect::{ProcessCollector, ProcessSort};
use vigil::config::parse_duration;
use vigil::{Agent, AgentConfig, ClientConfig, HistoryConfig, Registry, Server, SyncClient, SyncStatus};

#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(about = "Cross-platform resource-monitoring agent")]
struct Args {
    /// Address to serve the wire protocol on
    #[arg(short, long, default_value = "127.0.0.1:9070", conflicts_with = "connect")]
    listen: String,

    /// Connect to a running agent instead of collecting locally; each
    /// received bundle is written to stdout as one JSON line
    #[arg(short, long)]
    connect: Option<String>,

    /// Collection tick interval (e.g. "3s", "500ms")
    #[arg(long, default_value = "3s")]
    interval: String,

    /// Per-plugin refresh timeout
    #[arg(long, default_value = "2s")]
    plugin_timeout: String,

    /// History ring capacity per field
    #[arg(long, default_value = "60")]
    history: usize,

    /// Disable a plugin at startup (repeatable)
    #[arg(long = "disable", value_name = "PLUGIN")]
    disabled: Vec<String>,

    /// Only report processes whose name matches this regex
    #[arg(long, value_name = "REGEX")]
    process_filter: Option<String>,

    /// Maximum processes reported per tick
    #[arg(long, default_value = "10")]
    process_limit: usize,

    /// Sort key for the process list: cpu, memory or name
    #[arg(long, default_value = "cpu")]
    process_sort: String,

    /// Poll interval in connect mode
    #[arg(long, default_value = "2s")]
    poll_interval: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    match args.connect.clone() {
        Some(addr) => run_client(&addr, &args).await,
        None => run_agent(args).await,
    }
}

/// Collect locally and serve the wire protocol until interrupted.
async fn run_agent(args: Args) -> Result<()> {
    let config = AgentConfig {
        tick_interval: parse_duration(&args.interval).context("--interval")?,
        plugin_timeout: parse_duration(&args.plugin_timeout).context("--plugin-timeout")?,
        disabled_plugins: args.disabled.iter().cloned().collect(),
        history: HistoryConfig {
            capacity: args.history,
            ..HistoryConfig::default()
        },
        ..AgentConfig::default()
    };

    let sort = match args.process_sort.as_str() {
        "cpu" => ProcessSort::Cpu,
        "memory" => ProcessSort::Memory,
        "name" => ProcessSort::Name,
        other => anyhow::bail!("unknown process sort key: {other}"),
    };
    let filter = args
        .process_filter
        .as_deref()
        .map(regex::Regex::new)
        .transpose()
        .context("--process-filter")?;

    let mut registry = Registry::standard();
    registry.register(Box::new(ProcessCollector::with_options(
        sort,
        args.process_limit,
        filter,
    )));

    let agent = Agent::new(registry, config)?;
    let handle = agent.handle();
    let ticker = agent.start();

    let server = Server::bind(&args.listen, handle)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    info!(addr = %server.local_addr()?, "vigil agent serving");

    tokio::select! {
        result = server.run() => result.context("server failed")?,
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }
    ticker.stop();
    Ok(())
}

/// Poll a remote agent and hand each new bundle to stdout, one JSON
/// document per line.
async fn run_client(addr: &str, args: &Args) -> Result<()> {
    let config = ClientConfig {
        poll_interval: parse_duration(&args.poll_interval).context("--poll-interval")?,
        ..ClientConfig::default()
    };
    let client = SyncClient::new(addr, config);
    info!(%addr, "polling remote agent");

    let mut last_sequence = 0;
    loop {
        let delay = match client.poll_once().await {
            Ok(bundle) => {
                if bundle.sequence > last_sequence {
                    last_sequence = bundle.sequence;
                    println!("{}", serde_json::to_string(&*bundle)?);
                }
                client.retry_delay()
            }
            Err(error) => {
                if client.status() == SyncStatus::Disconnected {
                    warn!(%error, failures = client.failures(), "disconnected from agent");
                }
                client.retry_delay()
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return Ok(());
            }
        }
    }
}
