//! Ferrocache Server Binary
//!
//! Binds a TCP listener, spawns one task per accepted connection, and runs
//! until Ctrl+C.

use anyhow::{Context, Result};
use ferrocache::commands::CommandHandler;
use ferrocache::connection::handle_connection;
use ferrocache::stats::ServerStats;
use ferrocache::storage::Store;
use ferrocache::{DEFAULT_HOST, DEFAULT_PORT, VERSION};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

/// Server configuration from command-line arguments.
#[derive(Debug)]
struct Config {
    host: String,
    port: u16,
}

impl Config {
    /// Parses argv. Exits directly for `--help` and `--version`.
    fn from_args() -> Result<Self> {
        let mut config = Config {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        };

        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "-p" | "--port" => {
                    i += 1;
                    let value = args.get(i).context("missing value for --port")?;
                    config.port = value
                        .parse()
                        .with_context(|| format!("invalid port: {}", value))?;
                }
                "-h" | "--host" => {
                    i += 1;
                    config.host = args
                        .get(i)
                        .context("missing value for --host")?
                        .clone();
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "-v" | "--version" => {
                    println!("ferrocache {}", VERSION);
                    std::process::exit(0);
                }
                other => anyhow::bail!("unknown argument: {} (try --help)", other),
            }
            i += 1;
        }

        Ok(config)
    }
}

fn print_help() {
    println!("ferrocache {} - in-memory cache server", VERSION);
    println!();
    println!("USAGE:");
    println!("    ferrocache [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --host <HOST>    Address to bind [default: {}]", DEFAULT_HOST);
    println!("    -p, --port <PORT>    Port to listen on [default: {}]", DEFAULT_PORT);
    println!("        --help           Print this help");
    println!("    -v, --version        Print version");
}

async fn accept_loop(listener: TcpListener, store: Arc<Store>, stats: Arc<ServerStats>) {
    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                let handler = CommandHandler::new(Arc::clone(&store), Arc::clone(&stats));
                tokio::spawn(handle_connection(socket, addr, handler, Arc::clone(&stats)));
            }
            Err(err) => {
                error!(error = %err, "failed to accept connection");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferrocache=info".into()),
        )
        .init();

    let config = Config::from_args()?;

    let stats = Arc::new(ServerStats::new());
    let store = Arc::new(Store::new(Arc::clone(&stats)));

    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!(version = VERSION, addr = %bind_addr, "ferrocache listening");

    tokio::select! {
        _ = accept_loop(listener, store, stats) => {}
        result = signal::ctrl_c() => {
            result.context("failed to listen for shutdown signal")?;
            info!("shutting down");
        }
    }

    Ok(())
}
