//! Audio Client Application
//!
//! Captures audio, streams it through the DSP server and plays the result.
//!
//! Usage: `client [config.toml] [--list-devices]`

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spectral_voice_link::{
    audio::device::list_devices,
    config::AppConfig,
    constants::*,
    session::{ClientSession, RunFlag},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--list-devices") {
        print_devices();
        return Ok(());
    }

    let config_path = args.iter().find(|a| !a.starts_with("--")).map(PathBuf::from);
    let config = AppConfig::load_or_default(config_path.as_deref())?;
    config.validate()?;

    tracing::info!("Starting spectral voice client");
    tracing::info!(
        "DSP server {}:{}, {} Hz, {} samples/block",
        config.network.server_host,
        config.network.port,
        config.audio.sample_rate,
        config.audio.block_size
    );

    let running = RunFlag::new();
    let session = ClientSession::start(&config, running.clone())?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stats_timer = tokio::time::interval(Duration::from_secs(STATS_INTERVAL_SECS));
    stats_timer.tick().await;

    tracing::info!("Streaming - press Ctrl+C to stop");

    while session.is_running() {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for Ctrl+C: {}", e);
                }
                tracing::info!("Shutdown requested");
                break;
            }
            _ = stats_timer.tick() => {
                while let Some(err) = session.check_errors() {
                    tracing::warn!("Audio stream error: {}", err);
                }

                let stats = session.stats();
                tracing::info!(
                    "Stats: {:?}, {} round trips, {} transport failures, capture {}/{} ({} dropped), playback {} ({:.0}% full, {} dropped), {} processed, {} dry, {} bypassed",
                    stats.connection,
                    stats.round_trips,
                    stats.transport_failures,
                    stats.capture_queued,
                    RING_CAPACITY - 1,
                    stats.capture_drops,
                    stats.playback_queued,
                    stats.playback_fill * 100.0,
                    stats.playback_drops,
                    stats.processed,
                    stats.dry_fallbacks,
                    stats.bypasses
                );
            }
        }
    }

    running.stop();
    tokio::task::spawn_blocking(move || drop(session)).await?;

    tracing::info!("Exiting.");
    Ok(())
}

fn print_devices() {
    println!("\n=== Available Audio Devices ===");
    for device in list_devices() {
        let device_type = match (device.is_input, device.is_output) {
            (true, true) => "Input/Output",
            (true, false) => "Input",
            (false, true) => "Output",
            _ => "Unknown",
        };
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {} ({}){}", device.name, device_type, default_marker);
    }
    println!();
}
