//! ripd — a distance-vector routing daemon speaking a RIPv2-like protocol
//! over loopback UDP.
//!
//! One instance per simulated router. Configuration, wire format, timers,
//! and the Bellman-Ford update rule are described in `ripd::engine`.

use clap::Parser;
use ripd::clock::{RandomJitter, SystemClock};
use ripd::config::{Config, ConfigError};
use ripd::engine::Engine;
use ripd::net::listener;
use ripd::selfcheck::ExpectedRoute;
use ripd::snapshot;
use ripd::types::RouterId;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const JITTER_RANGE_SECS: i64 = 5;

#[derive(Parser)]
#[command(name = "ripd", version, about = "RIP-like distance-vector routing daemon")]
struct Args {
    /// Path to the router's configuration file.
    config_file: PathBuf,

    /// Bare positional tokens: `load` restores the persisted routing-table
    /// snapshot at startup; `verbose` raises the default log level. Either,
    /// both, or neither may be given, in any order.
    flags: Vec<String>,

    /// Optional path to a JSON file of expected converged routes, checked
    /// once per periodic cycle and logged on divergence.
    #[arg(long)]
    expected: Option<PathBuf>,
}

fn exit_with_config_error(err: ConfigError) -> ExitCode {
    error!("configuration error: {err}");
    ExitCode::from(err.exit_code() as u8)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let verbose = args.flags.iter().any(|f| f == "verbose");
    let load = args.flags.iter().any(|f| f == "load");

    let default_level = if verbose { "ripd=debug" } else { "ripd=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.parse().unwrap()),
        )
        .init();

    info!("ripd v{VERSION} starting, config={}", args.config_file.display());

    let config = match Config::load(&args.config_file) {
        Ok(c) => c,
        Err(e) => return exit_with_config_error(e),
    };

    info!(
        router_id = %config.router_id,
        input_ports = config.input_ports.len(),
        neighbours = config.neighbours.len(),
        update_period = config.update_period_secs,
        "configuration loaded"
    );

    let sockets = match listener::bind_all(&config.input_ports).await {
        Ok(s) => s,
        Err(e) => {
            error!("failed to bind input sockets: {e}");
            return ExitCode::from(12);
        }
    };

    let (tx, rx) = tokio::sync::mpsc::channel(256);
    let _readers = listener::spawn_readers(sockets, tx);

    let mut engine = Engine::new(&config, SystemClock, RandomJitter::new(JITTER_RANGE_SECS));

    if load {
        let path = snapshot::default_path(config.router_id);
        info!(path = %path.display(), "loading persisted routing table");
        engine.load_table(snapshot::load(&path));
    }

    if let Some(expected_path) = &args.expected {
        match load_expected(expected_path) {
            Ok(expected) => engine.set_expected(expected),
            Err(e) => error!("could not load expected-routes file, skipping self-check: {e}"),
        }
    }

    let snapshot_path = snapshot::default_path(config.router_id);
    if let Err(e) = snapshot::save(&snapshot_path, engine.table()) {
        error!(path = %snapshot_path.display(), error = %e, "could not write initial routing table snapshot");
    }

    info!("entering protocol engine event loop");
    engine.run(rx).await;

    ExitCode::SUCCESS
}

fn load_expected(
    path: &PathBuf,
) -> Result<HashMap<RouterId, ExpectedRoute>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let parsed: HashMap<RouterId, ExpectedRoute> = serde_json::from_str(&text)?;
    Ok(parsed)
}
