//! Hermes daemon
//!
//! Run one replication node and optionally follow peers.
//!
//! Usage:
//!   hermesd --addr localhost:10001
//!   hermesd --addr localhost:10002 --follow localhost:10001
//!
//! Clients connect with any line-based TCP tool, e.g. `nc localhost 10001`,
//! and send `v1` as the first line.

mod config;

use std::env;
use std::process;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use hermes_core::{HermesError, HermesResult};
use hermes_runtime::Node;

use config::{Command, DaemonConfig, DEFAULT_ADDR, ENV_ADDR, ENV_FOLLOW};

fn print_usage() {
    println!("Hermes replicated message hub");
    println!();
    println!("Usage:");
    println!("  hermesd [--addr <HOST:PORT>] [--follow <ADDR,ADDR,...>]");
    println!();
    println!("Options:");
    println!("  --addr <HOST:PORT>          Listening address (default: {})", DEFAULT_ADDR);
    println!("  --follow <ADDR,...>         Comma separated peers to replicate with");
    println!("  --dedup-capacity <N>        Message ids remembered for deduplication (default: 2000)");
    println!("  --help, -h                  Show this help");
    println!();
    println!("Environment:");
    println!("  {}                 Listening address (overridden by --addr)", ENV_ADDR);
    println!("  {}               Peers to follow (overridden by --follow)", ENV_FOLLOW);
    println!("  RUST_LOG                    Log filter (default: info)");
}

#[tokio::main]
async fn main() {
    let config = match Command::parse(env::args().skip(1), |key| env::var(key).ok()) {
        Ok(Command::Run(config)) => config,
        Ok(Command::Help) => {
            print_usage();
            return;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    if let Err(e) = run(config).await {
        error!(error = %e, "node error");
        process::exit(1);
    }
}

async fn run(config: DaemonConfig) -> HermesResult<()> {
    let listener = TcpListener::bind(&config.addr)
        .await
        .map_err(|e| HermesError::Config(format!("cannot listen on {}: {}", config.addr, e)))?;

    let node = Node::with_config(config.node);
    info!(node = %node.id(), addr = %config.addr, "node started");

    for addr in &config.follow {
        if let Err(e) = node.follow_addr(addr).await {
            warn!(peer = %addr, error = %e, "cannot follow");
        }
    }

    tokio::select! {
        res = node.serve(listener) => res,
        _ = tokio::signal::ctrl_c() => {
            info!(node = %node.id(), "shutting down");
            Ok(())
        }
    }
}
