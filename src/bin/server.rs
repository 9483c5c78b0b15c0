//! DSP Server Application
//!
//! Serves one client at a time, answering every audio block with its
//! phase-stripped, high-band-attenuated version.
//!
//! Usage: `server [config.toml]`

use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spectral_voice_link::{config::AppConfig, network::DspServer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load_or_default(config_path.as_deref())?;
    config.validate()?;

    tracing::info!("Starting spectral DSP server");

    let server = DspServer::bind(
        config.network.bind_addr()?,
        config.audio.block_size,
        config.dsp,
    )?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_task = tokio::spawn(server.run(shutdown_rx));

    tracing::info!("Press Ctrl+C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
    }
    tracing::info!("Shutdown requested");
    let _ = shutdown_tx.send(true);

    let sessions = server_task.await??;
    tracing::info!("Served {} sessions. Exiting.", sessions);
    Ok(())
}
