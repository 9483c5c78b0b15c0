//! Application configuration
//!
//! Loaded from TOML. Every field has a default, so an empty or missing file
//! yields a working local setup (client and server on the same machine).

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level configuration shared by both binaries
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub network: NetworkConfig,
    pub dsp: DspConfig,
}

/// Audio device settings (client side)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Samples per block; must match the server
    pub block_size: usize,
    /// Input device name, default device if unset
    pub input_device: Option<String>,
    /// Output device name, default device if unset
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            input_device: None,
            output_device: None,
        }
    }
}

/// Connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Host the client connects to
    pub server_host: String,
    /// Address the server listens on
    pub bind_address: String,
    pub port: u16,
    pub reconnect_delay_ms: u64,
    pub connect_timeout_ms: u64,
    /// Read/write timeout for one block transfer
    pub io_timeout_ms: u64,
    /// Sleep between polls of an empty capture ring
    pub idle_poll_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_host: DEFAULT_SERVER_HOST.to_string(),
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            io_timeout_ms: DEFAULT_IO_TIMEOUT_MS,
            idle_poll_ms: DEFAULT_IDLE_POLL_MS,
        }
    }
}

impl NetworkConfig {
    /// Resolve the server address the client connects to
    pub fn server_addr(&self) -> Result<SocketAddr> {
        resolve(&self.server_host, self.port)
    }

    /// Resolve the address the server binds
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        resolve(&self.bind_address, self.port)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| Error::Config(format!("Invalid address {}:{}: {}", host, port, e)))?
        .next()
        .ok_or_else(|| Error::Config(format!("Address {}:{} did not resolve", host, port)))
}

/// Spectral effect settings (server side)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DspConfig {
    /// Gain applied to bins `N/2..N` after phase removal; 1.0 disables it
    pub high_band_gain: f32,
}

impl Default for DspConfig {
    fn default() -> Self {
        Self {
            high_band_gain: DEFAULT_HIGH_BAND_GAIN,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, else from the per-user config file, else defaults
    ///
    /// An explicit path must exist; the per-user file is optional.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Per-user config file location
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Check invariants that both peers rely on
    pub fn validate(&self) -> Result<()> {
        let block_size = self.audio.block_size;
        if block_size < 2 || block_size % 2 != 0 {
            return Err(Error::Config(format!(
                "block_size must be even and at least 2, got {}",
                block_size
            )));
        }
        if self.audio.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be non-zero".to_string()));
        }

        let gain = self.dsp.high_band_gain;
        if !gain.is_finite() || !(0.0..=1.0).contains(&gain) {
            return Err(Error::Config(format!(
                "high_band_gain must be within [0, 1], got {}",
                gain
            )));
        }

        let net = &self.network;
        if net.connect_timeout_ms == 0 || net.io_timeout_ms == 0 {
            return Err(Error::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_local_setup() {
        let config = AppConfig::default();
        config.validate().unwrap();

        assert_eq!(config.audio.block_size, 1024);
        assert_eq!(config.audio.sample_rate, 48_000);
        assert_eq!(config.network.port, 4242);
        assert_eq!(config.network.reconnect_delay(), Duration::from_secs(1));
        assert_eq!(
            config.network.server_addr().unwrap(),
            "127.0.0.1:4242".parse().unwrap()
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [audio]
            block_size = 512

            [network]
            port = 5000
            "#,
        )
        .unwrap();

        assert_eq!(config.audio.block_size, 512);
        assert_eq!(config.audio.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(config.network.port, 5000);
        assert_eq!(config.network.server_host, "127.0.0.1");
        assert_eq!(config.dsp.high_band_gain, 0.05);
    }

    #[test]
    fn test_rejects_odd_block_size() {
        let err = AppConfig::from_toml("[audio]\nblock_size = 1023\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_out_of_range_gain() {
        let err = AppConfig::from_toml("[dsp]\nhigh_band_gain = 2.0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[network]\nserver_host = \"10.0.0.2\"").unwrap();

        let config = AppConfig::load_or_default(Some(file.path())).unwrap();
        assert_eq!(config.network.server_host, "10.0.0.2");
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(AppConfig::load_or_default(Some(missing.as_path())).is_err());
    }
}
