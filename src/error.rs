//! Error types for the spectral voice link

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("DSP error: {0}")]
    Dsp(#[from] DspError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio subsystem errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("cpal error: {0}")]
    CpalError(String),
}

/// Spectral transform errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DspError {
    #[error("Invalid block size: {0} (must be even and at least 2)")]
    InvalidBlockSize(usize),

    #[error("Block size mismatch: expected {expected} samples, got {actual}")]
    BlockSizeMismatch { expected: usize, actual: usize },
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket bind failed: {0}")]
    BindFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The peer stopped sending or accepting bytes before a whole block moved.
    #[error("Connection closed after {transferred} of {expected} bytes")]
    ConnectionClosed { transferred: usize, expected: usize },

    #[error("Frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
