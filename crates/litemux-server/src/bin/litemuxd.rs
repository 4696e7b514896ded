//! litemux server daemon.
//!
//! The `litemuxd` binary exposes a directory of SQLite databases through
//! one MySQL wire endpoint:
//! - opens (or creates) the data directory and every existing database
//! - listens for MySQL client connections
//! - handles graceful shutdown on SIGTERM/SIGINT
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings (0.0.0.0:4000, ./data)
//! litemuxd
//!
//! # Custom data directory and credentials
//! litemuxd --data /var/lib/litemux --root admin:secret
//!
//! # Trace every incoming statement
//! litemuxd --verbose
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use litemux_server::config::ServerConfig;
use litemux_server::database::Store;
use litemux_server::mysql::MysqlServer;

/// litemux server daemon
#[derive(Parser, Debug)]
#[command(
    name = "litemuxd",
    version,
    about = "MySQL wire endpoint for per-name SQLite databases",
    long_about = "litemux exposes independent on-disk SQLite databases through a single\n\
                  MySQL-protocol endpoint. Each database a client selects maps to one\n\
                  file under the data directory, created on first use."
)]
struct Args {
    /// Address to listen on
    #[arg(short = 'l', long, value_name = "ADDR", env = "LITEMUX_LISTEN")]
    listen: Option<String>,

    /// Directory holding one SQLite file per logical database
    #[arg(short = 'd', long, value_name = "DIR", env = "LITEMUX_DATA_DIR")]
    data: Option<PathBuf>,

    /// URI-style options appended to every database file when opened
    #[arg(long, value_name = "OPTS", env = "LITEMUX_DB_OPTIONS")]
    options: Option<String>,

    /// Root credentials (user:secret)
    #[arg(long, value_name = "USER:SECRET", env = "LITEMUX_ROOT")]
    root: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log each incoming statement
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = "LITEMUX_LOG_LEVEL")]
    log_level: String,

    /// Print configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = load_config(&args)?;

    // Initialize logging
    init_logging(&args, &config);

    // Print config and exit if requested
    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    // The data directory must exist and resolve before anything listens.
    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!(
            "failed to create data directory {}",
            config.data_dir.display()
        )
    })?;
    config.data_dir = std::fs::canonicalize(&config.data_dir).with_context(|| {
        format!(
            "failed to resolve data directory {}",
            config.data_dir.display()
        )
    })?;

    run_server(config).await
}

fn init_logging(args: &Args, config: &ServerConfig) {
    let level = if args.verbose || config.verbose {
        "debug"
    } else {
        &args.log_level
    };

    let filter = EnvFilter::try_new(format!("litemux_server={level},litemuxd={level}"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    // Start with defaults or the config file
    let mut config = if let Some(path) = &args.config {
        ServerConfig::from_file(path).context("failed to load config file")?
    } else {
        ServerConfig::default()
    };

    // Override with command-line arguments
    if let Some(listen) = &args.listen {
        config.listen_addr = listen.clone();
    }
    if let Some(data) = &args.data {
        config.data_dir = data.clone();
    }
    if let Some(options) = &args.options {
        config.db_options = options.clone();
    }
    if let Some(root) = &args.root {
        config.root = root.clone();
    }
    if args.verbose {
        config.verbose = true;
    }

    Ok(config)
}

async fn run_server(config: ServerConfig) -> Result<()> {
    // Opening the store eagerly verifies every existing database file;
    // any failure here is fatal.
    let store = Arc::new(
        Store::open(&config.data_dir, &config.db_options)
            .context("failed to open database store")?,
    );

    info!("data directory: {}", config.data_dir.display());
    info!("per-database options: {}", config.db_options);

    let server = MysqlServer::new(store, config);

    tokio::select! {
        result = server.serve() => {
            if let Err(e) = result {
                error!("server error: {e}");
                return Err(anyhow::anyhow!("server error: {e}"));
            }
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
