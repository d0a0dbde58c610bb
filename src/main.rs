//! Zentinel SOAP dispatch server binary.
//!
//! Run with: `zentinel-soap-dispatch --config config.yaml`
//!
//! Serves the configured canned responses per SOAP action, which makes it
//! usable as a mock SOAP endpoint.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use zentinel_soap_dispatch::server::{build_dispatcher, build_router, serve};
use zentinel_soap_dispatch::SoapDispatchConfig;

/// SOAP action dispatch server.
///
/// Parses SOAP envelopes, resolves the SOAPAction of each request and routes
/// it to the handler registered for that action.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Listen address, overrides `server.listen` from the config
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = args.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Starting Zentinel SOAP dispatch v{}", env!("CARGO_PKG_VERSION"));
    info!("Config file: {}", args.config.display());

    let mut config = if args.config.exists() {
        SoapDispatchConfig::from_yaml_file(&args.config).context("Failed to load config file")?
    } else {
        info!("Config file not found, using defaults");
        SoapDispatchConfig::default()
    };
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }

    let dispatcher = build_dispatcher(&config).context("Failed to register actions")?;

    info!(
        max_body_size = config.settings.max_body_size,
        max_depth = config.settings.max_depth,
        path = %config.server.path,
        actions = ?dispatcher.registry().actions(),
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen))?;

    let router = build_router(&config.server, dispatcher.into_service());
    serve(listener, router, shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("SOAP dispatch server shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server");
}
