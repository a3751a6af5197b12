//! Skiff Shell - desktop entry point
//!
//! Boots the bundled backend and gates the window layer on its readiness:
//! allocate a loopback port, spawn the backend with it, wait for the port
//! to accept connections, then hand the confirmed port to the rendering
//! context. Any startup failure terminates the whole application; a shell
//! without its backend has nothing to show.

mod bridge;
mod paths;

use clap::Parser;
use skiff_core::{Lifecycle, ProbeConfig, StartupContext};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Skiff Shell - desktop host for the bundled backend
#[derive(Parser)]
#[command(name = "skiff-shell")]
#[command(version)]
#[command(about = "Skiff Shell - desktop host for the bundled backend")]
struct Args {
    /// Runtime bundle directory (defaults to the packaged layout next to
    /// the executable, or the local-dev bundle in debug builds)
    #[arg(long)]
    bundle: Option<PathBuf>,

    /// Seconds to wait for the backend to accept connections
    #[arg(long, default_value_t = 15)]
    ready_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    tracing::info!("Skiff Shell v{}", env!("CARGO_PKG_VERSION"));

    let bundle_dir = match args.bundle.or_else(paths::default_bundle_dir) {
        Some(dir) => dir,
        None => {
            tracing::error!("No runtime bundle found; pass --bundle");
            std::process::exit(1);
        }
    };
    tracing::info!("Runtime bundle: {}", bundle_dir.display());

    let context = match StartupContext::from_bundle(&bundle_dir) {
        Ok(context) => context,
        Err(e) => {
            tracing::error!("Invalid runtime bundle: {}", e);
            std::process::exit(1);
        }
    };

    let probe = ProbeConfig {
        timeout: Duration::from_secs(args.ready_timeout_secs),
        ..ProbeConfig::default()
    };
    let lifecycle = Lifecycle::with_probe_config(context, probe);

    // The window layer never loads ahead of a confirmed backend.
    let port = match lifecycle.startup().await {
        Ok(port) => port,
        Err(e) => {
            tracing::error!("Backend startup failed: {}", e);
            lifecycle.shutdown();
            std::process::exit(1);
        }
    };

    tracing::info!(port, "Backend ready; handing off to the window layer");

    // The bridge payload is the only thing that crosses into the rendering
    // context: host OS identifier and the confirmed loopback URL.
    println!("{}", bridge::BridgePayload::for_port(port).to_json());

    // Mirror the quit / all-windows-closed triggers of the window layer by
    // waiting for the interrupt signal.
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    if !lifecycle
        .shutdown_and_wait(skiff_core::defaults::TERMINATE_WAIT)
        .await
    {
        tracing::warn!("Backend did not confirm exit within the wait bound");
    }

    Ok(())
}
