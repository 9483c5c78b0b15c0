//! Hardware period to block adaptation
//!
//! Audio hosts pick their own callback sizes: a requested buffer of N frames
//! may arrive as quarter periods, or as one oversized period after a stall.
//! [`PeriodAdapter`] sits between the output callback and the
//! [`AudioBridge`]. It gathers dry capture samples until a whole block is
//! available, runs the bridge once on that block, and plays the result back
//! out of a pending block at whatever pace the host asks for.
//!
//! Steady state adds one block of latency, less one sample. While the first block is
//! being gathered, or whenever the capture side falls behind, the dry samples
//! that are available are played as-is.

use ringbuf::traits::Consumer;
use ringbuf::HeapCons;

use crate::audio::block::Block;
use crate::audio::bridge::AudioBridge;

/// Re-blocks arbitrary output periods into bridge-sized blocks
pub struct PeriodAdapter<const CAPACITY: usize> {
    bridge: AudioBridge<CAPACITY>,
    dry: HeapCons<f32>,
    /// Dry samples popped for the current slice of the period
    scratch: Box<[f32]>,
    /// Block being gathered for the bridge
    gathered: Block,
    gathered_len: usize,
    /// Last bridge output, played from `cursor`
    pending: Block,
    cursor: usize,
}

impl<const CAPACITY: usize> PeriodAdapter<CAPACITY> {
    /// `scratch_len` bounds how many dry samples are popped at once; longer
    /// periods are handled in several slices.
    pub fn new(bridge: AudioBridge<CAPACITY>, dry: HeapCons<f32>, scratch_len: usize) -> Self {
        let block_len = bridge.block_len();

        Self {
            bridge,
            dry,
            scratch: vec![0.0; scratch_len.max(1)].into_boxed_slice(),
            gathered: Block::zeroed(block_len),
            gathered_len: 0,
            pending: Block::zeroed(block_len),
            // Nothing to play until the first block is through the bridge
            cursor: block_len,
        }
    }

    /// Fill one hardware output period
    ///
    /// Does not allocate, lock or block. Silence is written only for samples
    /// that have neither a pending block sample nor a dry sample behind them.
    pub fn render(&mut self, output: &mut [f32]) {
        for slice in output.chunks_mut(self.scratch.len()) {
            let available = self.dry.pop_slice(&mut self.scratch[..slice.len()]);

            for (i, out) in slice.iter_mut().enumerate() {
                let dry = if i < available {
                    Some(self.scratch[i])
                } else {
                    None
                };
                *out = self.step(dry);
            }
        }
    }

    /// Advance by one sample
    fn step(&mut self, dry: Option<f32>) -> f32 {
        let block_len = self.gathered.len();

        if let Some(sample) = dry {
            self.gathered[self.gathered_len] = sample;
            self.gathered_len += 1;

            if self.gathered_len == block_len {
                self.bridge.process(&self.gathered, &mut self.pending);
                self.gathered_len = 0;
                self.cursor = 0;
            }
        }

        if self.cursor < block_len {
            let sample = self.pending[self.cursor];
            self.cursor += 1;
            sample
        } else {
            dry.unwrap_or(0.0)
        }
    }
}
