//! Client session lifecycle
//!
//! A [`ClientSession`] owns everything that lives for one streaming run:
//! both block rings, the network pump thread, the audio stream and the
//! [`RunFlag`] that tells them all to stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::audio::bridge::{AudioBridge, BridgeStats};
use crate::audio::buffer::{RingBuffer, RingMonitor};
use crate::audio::stream::DuplexStream;
use crate::config::AppConfig;
use crate::constants::RING_CAPACITY;
use crate::error::{AudioError, Result};
use crate::network::pump::{ConnectionState, NetworkPump, PumpSettings, PumpStats};

/// Granularity of cancellable sleeps
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Shared cancellation flag
///
/// Cloned into every thread of a session; clearing it asks all of them to
/// wind down at their next check.
#[derive(Clone, Debug)]
pub struct RunFlag {
    running: Arc<AtomicBool>,
}

impl RunFlag {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Sleep for up to `duration`, waking early if the flag is cleared
    ///
    /// Returns whether the flag is still set.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
        false
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a running session
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub connection: ConnectionState,
    pub round_trips: u64,
    pub transport_failures: u64,
    pub capture_queued: usize,
    pub capture_drops: u64,
    pub playback_queued: usize,
    /// Playback ring fill as a fraction of its capacity
    pub playback_fill: f32,
    pub playback_drops: u64,
    pub processed: u64,
    pub dry_fallbacks: u64,
    pub bypasses: u64,
}

/// Audio capture, network pump and playback for one client run
pub struct ClientSession {
    running: RunFlag,
    stream: Option<DuplexStream>,
    pump_handle: Option<JoinHandle<()>>,
    pump_stats: Arc<PumpStats>,
    bridge_stats: Arc<BridgeStats>,
    capture: RingMonitor<RING_CAPACITY>,
    playback: RingMonitor<RING_CAPACITY>,
}

impl ClientSession {
    /// Allocate the rings, start the pump thread and open the audio streams
    ///
    /// Any failure here is a setup failure; the pump is stopped again before
    /// the error is returned.
    pub fn start(config: &AppConfig, running: RunFlag) -> Result<Self> {
        config.validate()?;
        let settings = PumpSettings::from_config(&config.network)?;
        let block_len = config.audio.block_size;

        let capture_ring = RingBuffer::<RING_CAPACITY>::new(block_len);
        let playback_ring = RingBuffer::<RING_CAPACITY>::new(block_len);
        let capture = capture_ring.monitor();
        let playback = playback_ring.monitor();
        let (capture_tx, capture_rx) = capture_ring.split();
        let (playback_tx, playback_rx) = playback_ring.split();

        let bridge = AudioBridge::new(capture_tx, playback_rx, block_len);
        let bridge_stats = bridge.stats();

        let pump = NetworkPump::new(settings, capture_rx, playback_tx, running.clone());
        let pump_stats = pump.stats();
        let pump_handle = pump.spawn()?;

        let stream = match DuplexStream::start(&config.audio, bridge, running.clone()) {
            Ok(stream) => stream,
            Err(e) => {
                running.stop();
                let _ = pump_handle.join();
                return Err(e.into());
            }
        };

        tracing::info!(
            "Session started: {} samples/block, ring capacity {} blocks",
            block_len,
            capture.capacity()
        );

        Ok(Self {
            running,
            stream: Some(stream),
            pump_handle: Some(pump_handle),
            pump_stats,
            bridge_stats,
            capture,
            playback,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            connection: self.pump_stats.state(),
            round_trips: self.pump_stats.round_trips(),
            transport_failures: self.pump_stats.transport_failures(),
            capture_queued: self.capture.len(),
            capture_drops: self.capture.dropped_count(),
            playback_queued: self.playback.len(),
            playback_fill: self.playback.fill_level(),
            playback_drops: self.playback.dropped_count(),
            processed: self.bridge_stats.processed(),
            dry_fallbacks: self.bridge_stats.dry_fallbacks(),
            bypasses: self.bridge_stats.bypasses(),
        }
    }

    /// Next error reported by the audio backend, if any
    pub fn check_errors(&self) -> Option<AudioError> {
        self.stream.as_ref().and_then(|s| s.check_errors())
    }

    /// Stop the audio streams and join the pump thread
    pub fn stop(&mut self) {
        self.running.stop();

        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        if let Some(handle) = self.pump_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flag_is_shared_between_clones() {
        let flag = RunFlag::new();
        let other = flag.clone();
        assert!(other.is_running());

        flag.stop();
        assert!(!other.is_running());
    }

    #[test]
    fn test_sleep_wakes_early_on_stop() {
        let flag = RunFlag::new();
        let stopper = flag.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            stopper.stop();
        });

        let started = Instant::now();
        assert!(!flag.sleep(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_sleep_runs_to_completion_while_running() {
        let flag = RunFlag::new();
        assert!(flag.sleep(Duration::from_millis(15)));
    }
}
