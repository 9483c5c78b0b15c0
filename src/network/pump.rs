//! Network pump
//!
//! Dedicated thread that owns the connection to the DSP server. It drains
//! the capture ring, runs one request/response exchange per block and feeds
//! the playback ring. This is the only part of the client that blocks.
//!
//! Any transport failure drops the connection and goes back to connecting
//! after a fixed delay. If the playback ring is full the processed block is
//! dropped: stale audio is worse than a short dry gap.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::block::Block;
use crate::audio::buffer::{BlockConsumer, BlockProducer};
use crate::config::NetworkConfig;
use crate::error::{NetworkError, Result};
use crate::network::socket::connect_stream;
use crate::network::transfer::BlockTransfer;
use crate::session::RunFlag;

/// Connection lifecycle as seen by the pump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Streaming,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Streaming,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Counters shared between the pump thread and observers
#[derive(Debug, Default)]
pub struct PumpStats {
    round_trips: AtomicU64,
    playback_drops: AtomicU64,
    connections: AtomicU64,
    transport_failures: AtomicU64,
    state: AtomicU8,
}

impl PumpStats {
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Relaxed))
    }

    /// Completed request/response exchanges
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }

    /// Processed blocks discarded because the playback ring was full
    pub fn playback_drops(&self) -> u64 {
        self.playback_drops.load(Ordering::Relaxed)
    }

    /// Connections successfully established
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    pub fn transport_failures(&self) -> u64 {
        self.transport_failures.load(Ordering::Relaxed)
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }
}

/// Connection parameters for the pump
#[derive(Debug, Clone)]
pub struct PumpSettings {
    pub server_addr: SocketAddr,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
    pub idle_poll: Duration,
}

impl PumpSettings {
    pub fn from_config(config: &NetworkConfig) -> Result<Self> {
        Ok(Self {
            server_addr: config.server_addr()?,
            reconnect_delay: config.reconnect_delay(),
            connect_timeout: config.connect_timeout(),
            io_timeout: config.io_timeout(),
            idle_poll: config.idle_poll(),
        })
    }
}

/// Outcome of a single pump iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStep {
    /// Capture ring was empty; nothing was sent
    Idle,
    /// Processed block queued for playback
    Delivered,
    /// Processed block discarded, playback ring full
    Dropped,
}

/// Moves blocks between the rings and the DSP server
pub struct NetworkPump<const CAPACITY: usize> {
    settings: PumpSettings,
    capture: BlockConsumer<CAPACITY>,
    playback: BlockProducer<CAPACITY>,
    transfer: BlockTransfer,
    request: Block,
    response: Block,
    running: RunFlag,
    stats: Arc<PumpStats>,
}

impl<const CAPACITY: usize> NetworkPump<CAPACITY> {
    pub fn new(
        settings: PumpSettings,
        capture: BlockConsumer<CAPACITY>,
        playback: BlockProducer<CAPACITY>,
        running: RunFlag,
    ) -> Self {
        let block_len = capture.monitor().block_len();
        Self {
            settings,
            capture,
            playback,
            transfer: BlockTransfer::new(block_len),
            request: Block::zeroed(block_len),
            response: Block::zeroed(block_len),
            running,
            stats: Arc::new(PumpStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<PumpStats> {
        Arc::clone(&self.stats)
    }

    /// Run the pump on its own thread
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("network-pump".to_string())
            .spawn(move || self.run())
    }

    /// Connect, stream, reconnect; returns once the run flag is cleared
    pub fn run(mut self) {
        let addr = self.settings.server_addr;

        while self.running.is_running() {
            let Some(mut stream) = self.connect() else {
                break;
            };

            self.stats.connections.fetch_add(1, Ordering::Relaxed);
            self.stats.set_state(ConnectionState::Streaming);
            tracing::info!("Connected to DSP server {}", addr);

            if let Err(e) = self.stream_blocks(&mut stream) {
                self.stats.transport_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Transfer with {} failed: {}, reconnecting...", addr, e);
            }

            drop(stream);
            self.stats.set_state(ConnectionState::Disconnected);
            tracing::info!("Disconnected from DSP server {}", addr);

            if self.running.is_running() {
                self.running.sleep(self.settings.reconnect_delay);
            }
        }

        self.stats.set_state(ConnectionState::Disconnected);
        tracing::info!("Network pump exiting");
    }

    /// Retry until connected or stopped
    fn connect(&self) -> Option<TcpStream> {
        let settings = &self.settings;

        while self.running.is_running() {
            self.stats.set_state(ConnectionState::Connecting);
            tracing::debug!("Connecting to DSP server {}...", settings.server_addr);

            match connect_stream(settings.server_addr, settings.connect_timeout, settings.io_timeout) {
                Ok(stream) => return Some(stream),
                Err(e) => {
                    self.stats.set_state(ConnectionState::Disconnected);
                    tracing::warn!("{} (will retry)", e);
                    self.running.sleep(settings.reconnect_delay);
                }
            }
        }
        None
    }

    fn stream_blocks<S: Read + Write + ?Sized>(&mut self, stream: &mut S) -> std::result::Result<(), NetworkError> {
        while self.running.is_running() {
            if self.pump_once(stream)? == PumpStep::Idle {
                thread::sleep(self.settings.idle_poll);
            }
        }
        Ok(())
    }

    /// Take one captured block, if any, through the server and into playback
    ///
    /// Never blocks on the rings; only the network exchange can block.
    pub fn pump_once<S: Read + Write + ?Sized>(
        &mut self,
        stream: &mut S,
    ) -> std::result::Result<PumpStep, NetworkError> {
        if !self.capture.pop(&mut self.request) {
            return Ok(PumpStep::Idle);
        }

        self.transfer
            .exchange(stream, &self.request, &mut self.response)?;
        self.stats.round_trips.fetch_add(1, Ordering::Relaxed);

        if self.playback.push(&self.response) {
            Ok(PumpStep::Delivered)
        } else {
            self.stats.playback_drops.fetch_add(1, Ordering::Relaxed);
            Ok(PumpStep::Dropped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::RingBuffer;
    use crate::network::transfer::tests::{encode, ChunkedStream};
    use std::time::Instant;

    const LEN: usize = 8;

    fn settings(addr: SocketAddr) -> PumpSettings {
        PumpSettings {
            server_addr: addr,
            reconnect_delay: Duration::from_millis(20),
            connect_timeout: Duration::from_millis(200),
            io_timeout: Duration::from_millis(200),
            idle_poll: Duration::from_millis(1),
        }
    }

    fn unused_addr() -> SocketAddr {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap()
    }

    #[test]
    fn test_idle_when_capture_empty() {
        let (_capture_tx, capture_rx) = RingBuffer::<4>::new(LEN).split();
        let (playback_tx, _playback_rx) = RingBuffer::<4>::new(LEN).split();
        let mut pump = NetworkPump::new(settings(unused_addr()), capture_rx, playback_tx, RunFlag::new());

        let mut stream = ChunkedStream::new(Vec::new(), 64);
        assert_eq!(pump.pump_once(&mut stream).unwrap(), PumpStep::Idle);
        assert!(stream.output.is_empty());
    }

    #[test]
    fn test_round_trip_feeds_playback() {
        let (mut capture_tx, capture_rx) = RingBuffer::<4>::new(LEN).split();
        let (playback_tx, mut playback_rx) = RingBuffer::<4>::new(LEN).split();
        let mut pump = NetworkPump::new(settings(unused_addr()), capture_rx, playback_tx, RunFlag::new());

        let request = [0.5f32; LEN];
        let response = [-0.125f32; LEN];
        assert!(capture_tx.push(&request));

        let mut stream = ChunkedStream::new(encode(&response), 3);
        assert_eq!(pump.pump_once(&mut stream).unwrap(), PumpStep::Delivered);
        assert_eq!(stream.output, encode(&request));

        let mut out = [0.0f32; LEN];
        assert!(playback_rx.pop(&mut out));
        assert_eq!(out, response);
        assert_eq!(pump.stats().round_trips(), 1);
    }

    #[test]
    fn test_full_playback_drops_without_blocking() {
        let (mut capture_tx, capture_rx) = RingBuffer::<4>::new(LEN).split();
        let playback_ring = RingBuffer::<4>::new(LEN);
        let playback = playback_ring.monitor();
        let (mut playback_tx, mut playback_rx) = playback_ring.split();

        // Fill playback with three stale blocks
        for i in 0..3 {
            assert!(playback_tx.push(&[i as f32; LEN]));
        }
        let mut pump = NetworkPump::new(settings(unused_addr()), capture_rx, playback_tx, RunFlag::new());

        assert!(capture_tx.push(&[1.0; LEN]));
        let mut stream = ChunkedStream::new(encode(&[9.0; LEN]), 64);

        let started = Instant::now();
        assert_eq!(pump.pump_once(&mut stream).unwrap(), PumpStep::Dropped);
        assert!(started.elapsed() < Duration::from_secs(1));

        let stats = pump.stats();
        assert_eq!(stats.playback_drops(), 1);
        assert_eq!(stats.round_trips(), 1);
        assert_eq!(playback.dropped_count(), 1);

        // Queue still holds the original blocks in order
        let mut out = [0.0f32; LEN];
        for i in 0..3 {
            assert!(playback_rx.pop(&mut out));
            assert_eq!(out, [i as f32; LEN]);
        }
        assert!(!playback_rx.pop(&mut out));
    }

    #[test]
    fn test_short_response_is_a_transport_failure() {
        let (mut capture_tx, capture_rx) = RingBuffer::<4>::new(LEN).split();
        let playback_ring = RingBuffer::<4>::new(LEN);
        let playback = playback_ring.monitor();
        let (playback_tx, _playback_rx) = playback_ring.split();
        let mut pump = NetworkPump::new(settings(unused_addr()), capture_rx, playback_tx, RunFlag::new());

        assert!(capture_tx.push(&[1.0; LEN]));
        let mut stream = ChunkedStream::new(vec![0u8; 5], 64);

        let err = pump.pump_once(&mut stream).unwrap_err();
        assert!(matches!(err, NetworkError::ConnectionClosed { .. }));
        assert!(playback.is_empty());
    }

    #[test]
    fn test_run_retries_until_stopped() {
        let (_capture_tx, capture_rx) = RingBuffer::<4>::new(LEN).split();
        let (playback_tx, _playback_rx) = RingBuffer::<4>::new(LEN).split();
        let running = RunFlag::new();
        let pump = NetworkPump::new(settings(unused_addr()), capture_rx, playback_tx, running.clone());
        let stats = pump.stats();

        let handle = pump.spawn().unwrap();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(stats.connections(), 0);

        let stopped_at = Instant::now();
        running.stop();
        handle.join().unwrap();

        assert!(stopped_at.elapsed() < Duration::from_secs(2));
        assert_eq!(stats.state(), ConnectionState::Disconnected);
    }
}
