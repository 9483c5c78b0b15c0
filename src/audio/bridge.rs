//! Real-time audio bridge
//!
//! Runs inside the hardware callback. Each invocation hands the captured
//! block to the network side and takes a processed block back, using only
//! the lock-free rings: no blocking, no allocation, no locks, no logging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::buffer::{BlockConsumer, BlockProducer};

/// What the bridge wrote to the output for one callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// A processed block from the server
    Processed,
    /// Nothing processed was ready; the dry input was passed through
    DryFallback,
    /// Callback size was not one block; DSP skipped, input copied through
    Bypassed,
}

/// Callback counters, readable from any thread
#[derive(Debug, Default)]
pub struct BridgeStats {
    processed: AtomicU64,
    dry_fallbacks: AtomicU64,
    bypasses: AtomicU64,
}

impl BridgeStats {
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn dry_fallbacks(&self) -> u64 {
        self.dry_fallbacks.load(Ordering::Relaxed)
    }

    pub fn bypasses(&self) -> u64 {
        self.bypasses.load(Ordering::Relaxed)
    }
}

/// Callback-side ends of the capture and playback rings
pub struct AudioBridge<const CAPACITY: usize> {
    capture: BlockProducer<CAPACITY>,
    playback: BlockConsumer<CAPACITY>,
    block_len: usize,
    stats: Arc<BridgeStats>,
}

impl<const CAPACITY: usize> AudioBridge<CAPACITY> {
    pub fn new(
        capture: BlockProducer<CAPACITY>,
        playback: BlockConsumer<CAPACITY>,
        block_len: usize,
    ) -> Self {
        Self {
            capture,
            playback,
            block_len,
            stats: Arc::new(BridgeStats::default()),
        }
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    pub fn stats(&self) -> Arc<BridgeStats> {
        Arc::clone(&self.stats)
    }

    /// Handle one hardware period
    ///
    /// `input` holds the captured samples and `output` receives what is
    /// played. A full capture ring drops the captured block; an empty
    /// playback ring plays the dry input instead of silence.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> BridgeOutcome {
        if input.len() != self.block_len || output.len() != self.block_len {
            copy_dry(input, output);
            self.stats.bypasses.fetch_add(1, Ordering::Relaxed);
            return BridgeOutcome::Bypassed;
        }

        // A rejected push is already counted by the ring
        let _ = self.capture.push(input);

        if self.playback.pop(output) {
            self.stats.processed.fetch_add(1, Ordering::Relaxed);
            BridgeOutcome::Processed
        } else {
            output.copy_from_slice(input);
            self.stats.dry_fallbacks.fetch_add(1, Ordering::Relaxed);
            BridgeOutcome::DryFallback
        }
    }
}

/// Copy as much of `input` as fits and silence the rest
fn copy_dry(input: &[f32], output: &mut [f32]) {
    let n = input.len().min(output.len());
    output[..n].copy_from_slice(&input[..n]);
    output[n..].fill(0.0);
}
