//! Fixed-length sample block
//!
//! A [`Block`] is the unit of transfer between every stage of the link:
//! capture, ring buffers, the wire and the spectral engine. Its length is
//! chosen once per session and never changes.

use std::ops::{Deref, DerefMut};

/// Owned block of mono `f32` samples
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    samples: Box<[f32]>,
}

impl Block {
    /// Create a block of `len` zeroed samples
    pub fn zeroed(len: usize) -> Self {
        Self {
            samples: vec![0.0; len].into_boxed_slice(),
        }
    }

    /// Number of samples in the block
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    /// Overwrite this block with `samples`
    ///
    /// Returns false and leaves the block untouched when the lengths differ.
    pub fn copy_from(&mut self, samples: &[f32]) -> bool {
        if samples.len() != self.samples.len() {
            return false;
        }
        self.samples.copy_from_slice(samples);
        true
    }
}

impl From<Vec<f32>> for Block {
    fn from(samples: Vec<f32>) -> Self {
        Self {
            samples: samples.into_boxed_slice(),
        }
    }
}

impl Deref for Block {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.samples
    }
}

impl DerefMut for Block {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }
}
