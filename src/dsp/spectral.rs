//! Spectral "robot voice" transform
//!
//! Each block is taken to the frequency domain, stripped of phase (every bin
//! becomes its magnitude on the real axis), the upper half of the bin range
//! is attenuated, and the result is taken back to the time domain.
//!
//! Blocks are transformed independently: no window, no overlap-add and no
//! state carried from one block to the next. The discontinuities this leaves
//! at block boundaries are part of the effect.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::config::DspConfig;
use crate::error::DspError;

/// Per-session spectral engine with pre-planned transforms
///
/// All buffers are allocated in [`SpectralEngine::new`]; processing a block
/// does not allocate.
pub struct SpectralEngine {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    block_len: usize,
    high_band_gain: f32,
    /// Complex working buffer, transformed in place
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectralEngine {
    /// Plan forward and inverse transforms for blocks of `block_len` samples
    pub fn new(block_len: usize, config: DspConfig) -> Result<Self, DspError> {
        if block_len < 2 || block_len % 2 != 0 {
            return Err(DspError::InvalidBlockSize(block_len));
        }

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(block_len);
        let inverse = planner.plan_fft_inverse(block_len);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Ok(Self {
            forward,
            inverse,
            block_len,
            high_band_gain: config.high_band_gain,
            spectrum: vec![Complex::new(0.0, 0.0); block_len],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        })
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Transform one block from `input` into `output`
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), DspError> {
        self.check_len(input.len())?;
        self.check_len(output.len())?;

        self.load(input);
        self.transform();
        self.store(output);
        Ok(())
    }

    /// Transform one block in place
    pub fn process_in_place(&mut self, block: &mut [f32]) -> Result<(), DspError> {
        self.check_len(block.len())?;

        self.load(block);
        self.transform();
        self.store(block);
        Ok(())
    }

    /// Real samples in, imaginary parts zeroed
    fn load(&mut self, input: &[f32]) {
        for (bin, &sample) in self.spectrum.iter_mut().zip(input) {
            *bin = Complex::new(sample, 0.0);
        }
    }

    fn transform(&mut self) {
        self.forward
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        for bin in self.spectrum.iter_mut() {
            *bin = Complex::new(bin.norm(), 0.0);
        }

        let half = self.block_len / 2;
        for bin in &mut self.spectrum[half..] {
            bin.re *= self.high_band_gain;
        }

        self.inverse
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);
    }

    /// Real part only, scaled by 1/N since neither transform normalizes
    fn store(&self, output: &mut [f32]) {
        let scale = self.block_len as f32;
        for (sample, bin) in output.iter_mut().zip(&self.spectrum) {
            *sample = bin.re / scale;
        }
    }

    fn check_len(&self, len: usize) -> Result<(), DspError> {
        if len != self.block_len {
            return Err(DspError::BlockSizeMismatch {
                expected: self.block_len,
                actual: len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const N: usize = 1024;

    fn engine(gain: f32) -> SpectralEngine {
        SpectralEngine::new(N, DspConfig { high_band_gain: gain }).unwrap()
    }

    fn speech_like_block() -> Vec<f32> {
        (0..N)
            .map(|i| {
                let t = i as f32 / 48_000.0;
                0.4 * (2.0 * PI * 220.0 * t).sin()
                    + 0.2 * (2.0 * PI * 660.0 * t + 0.3).sin()
                    + 0.05 * (2.0 * PI * 5_000.0 * t).cos()
            })
            .collect()
    }

    #[test]
    fn test_rejects_invalid_block_sizes() {
        let config = DspConfig::default();
        assert_eq!(
            SpectralEngine::new(0, config).err(),
            Some(DspError::InvalidBlockSize(0))
        );
        assert_eq!(
            SpectralEngine::new(1023, config).err(),
            Some(DspError::InvalidBlockSize(1023))
        );
    }

    #[test]
    fn test_rejects_wrong_length_blocks() {
        let mut engine = engine(0.05);
        let input = vec![0.0; N - 1];
        let mut output = vec![0.0; N];

        assert_eq!(
            engine.process(&input, &mut output),
            Err(DspError::BlockSizeMismatch { expected: N, actual: N - 1 })
        );
    }

    #[test]
    fn test_output_is_bit_reproducible() {
        let input = speech_like_block();

        let mut first = vec![0.0; N];
        let mut engine_a = engine(0.05);
        engine_a.process(&input, &mut first).unwrap();

        // Same engine again, after processing something unrelated
        let mut again = vec![0.0; N];
        engine_a.process(&vec![0.7; N], &mut again).unwrap();
        engine_a.process(&input, &mut again).unwrap();

        // Fresh engine
        let mut fresh = vec![0.0; N];
        engine(0.05).process(&input, &mut fresh).unwrap();

        let bits = |v: &[f32]| v.iter().map(|s| s.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&first), bits(&again));
        assert_eq!(bits(&first), bits(&fresh));
    }

    #[test]
    fn test_in_place_matches_out_of_place() {
        let input = speech_like_block();
        let mut engine = engine(0.05);

        let mut output = vec![0.0; N];
        engine.process(&input, &mut output).unwrap();

        let mut block = input.clone();
        engine.process_in_place(&mut block).unwrap();
        assert_eq!(block, output);
    }

    #[test]
    fn test_dc_block_is_preserved() {
        // Only bin 0 carries energy, and it sits below the attenuated range
        let input = vec![0.5; N];
        let mut output = vec![0.0; N];
        engine(0.05).process(&input, &mut output).unwrap();

        for &s in &output {
            assert!((s - 0.5).abs() < 1e-3, "expected 0.5, got {}", s);
        }
    }

    #[test]
    fn test_negative_dc_loses_its_sign() {
        // Phase removal maps the DC bin to its magnitude
        let input = vec![-0.25; N];
        let mut output = vec![0.0; N];
        engine(0.05).process(&input, &mut output).unwrap();

        for &s in &output {
            assert!((s - 0.25).abs() < 1e-3, "expected 0.25, got {}", s);
        }
    }

    #[test]
    fn test_nyquist_energy_is_attenuated_by_gain() {
        // Alternating signal: all energy in bin N/2
        let input: Vec<f32> = (0..N).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();

        let mut dry = vec![0.0; N];
        engine(1.0).process(&input, &mut dry).unwrap();

        let mut wet = vec![0.0; N];
        engine(0.05).process(&input, &mut wet).unwrap();

        let rms = |v: &[f32]| (v.iter().map(|s| s * s).sum::<f32>() / v.len() as f32).sqrt();
        let ratio = rms(&wet) / rms(&dry);
        assert!((ratio - 0.05).abs() < 1e-3, "ratio was {}", ratio);
    }

    #[test]
    fn test_sine_phase_is_discarded() {
        // sin at bin k: bins k and N-k both have magnitude N/2. After the
        // effect, bin k keeps N/2 and bin N-k is scaled by the gain, so the
        // output is a zero-phase cosine of amplitude (1 + gain) / 2.
        let k = 16;
        let input: Vec<f32> = (0..N)
            .map(|i| (2.0 * PI * (k * i) as f32 / N as f32).sin())
            .collect();

        let mut output = vec![0.0; N];
        engine(0.05).process(&input, &mut output).unwrap();

        for (i, &s) in output.iter().enumerate() {
            let expected = 0.525 * (2.0 * PI * (k * i) as f32 / N as f32).cos();
            assert!((s - expected).abs() < 1e-3, "sample {}: {} vs {}", i, s, expected);
        }
    }

    #[test]
    fn test_silence_stays_silent() {
        let input = vec![0.0; N];
        let mut output = vec![1.0; N];
        engine(0.05).process(&input, &mut output).unwrap();
        assert!(output.iter().all(|&s| s == 0.0));
    }
}
