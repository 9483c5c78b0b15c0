//! # Spectral Voice Link
//!
//! Live audio round trip through a remote spectral ("robot voice") DSP stage.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────── CLIENT ────────────────────────────────┐
//! │                                                                        │
//! │  ┌──────────┐   ┌─────────────────────────┐        ┌──────────────┐    │
//! │  │ Mic (in) │──▶│      Audio Bridge       │───────▶│ Speaker (out)│    │
//! │  └──────────┘   │ (audio::bridge, RT cb)  │        └──────────────┘    │
//! │                 │ fed whole blocks by the │                            │
//! │                 │ period adapter          │                            │
//! │                 └──────┬───────────▲──────┘                            │
//! │            push (drop  │           │ pop (dry pass-through             │
//! │            when full)  ▼           │ when empty)                       │
//! │                 ┌────────────┐ ┌────────────┐                          │
//! │                 │  Capture   │ │  Playback  │   SPSC block rings       │
//! │                 │   ring     │ │   ring     │   (audio::buffer)        │
//! │                 └──────┬─────┘ └─────▲──────┘                          │
//! │                        │             │ push (drop when full)           │
//! │                        ▼             │                                 │
//! │                 ┌─────────────────────────┐                            │
//! │                 │      Network Pump       │  dedicated thread,         │
//! │                 │    (network::pump)      │  reconnect with delay      │
//! │                 └──────┬───────────▲──────┘                            │
//! └────────────────────────┼───────────┼───────────────────────────────────┘
//!        request block     │           │   response block
//!        (N raw f32)       ▼           │   (N raw f32)      TCP
//! ┌────────────────────────┼───────────┼───────────────────────────────────┐
//! │                 ┌─────────────────────────┐                            │
//! │                 │   DSP Server Session    │  one client at a time      │
//! │                 │   (network::server)     │                            │
//! │                 └──────┬───────────▲──────┘                            │
//! │                        ▼           │                                   │
//! │                 ┌─────────────────────────┐                            │
//! │                 │  FFT → |X| → high-band  │                            │
//! │                 │  gain → IFFT → 1/N      │  (dsp::spectral)           │
//! │                 └─────────────────────────┘                            │
//! └──────────────────────────────── SERVER ────────────────────────────────┘
//! ```

pub mod audio;
pub mod config;
pub mod dsp;
pub mod error;
pub mod network;
pub mod protocol;
pub mod session;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Name used for the per-user config directory
    pub const APP_NAME: &str = "spectral-voice-link";

    /// Default sample rate for audio processing
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Channel count (mono)
    pub const CHANNELS: u16 = 1;

    /// Default samples per block
    pub const DEFAULT_BLOCK_SIZE: usize = 1024;

    /// Slots per block ring (one is kept free, so 7 blocks are usable)
    pub const RING_CAPACITY: usize = 8;

    /// Default TCP port of the DSP server
    pub const DEFAULT_PORT: u16 = 4242;

    /// Default DSP server host for the client
    pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

    /// Listen backlog of the DSP server
    pub const LISTEN_BACKLOG: i32 = 1;

    /// Delay between connection attempts
    pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;

    pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2000;

    /// Upper bound on a single blocking read or write
    pub const DEFAULT_IO_TIMEOUT_MS: u64 = 1000;

    /// Sleep when the capture ring is empty
    pub const DEFAULT_IDLE_POLL_MS: u64 = 1;

    /// Gain for the upper half of the spectrum after phase removal
    pub const DEFAULT_HIGH_BAND_GAIN: f32 = 0.05;

    /// Interval between client statistics log lines
    pub const STATS_INTERVAL_SECS: u64 = 5;
}
