//! Server-side signal processing

pub mod spectral;

pub use spectral::SpectralEngine;
