//! Wire format for audio blocks
//!
//! A block travels as the raw concatenation of its samples, each encoded as
//! a native-endian IEEE-754 `f32`. There is no header, length prefix or
//! marker: both peers agree on the block length out of band, so a frame is
//! always exactly `block_len * SAMPLE_BYTES` bytes.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::NetworkError;

/// Bytes per encoded sample
pub const SAMPLE_BYTES: usize = std::mem::size_of::<f32>();

/// Encoded size of one block of `block_len` samples
pub const fn block_bytes(block_len: usize) -> usize {
    block_len * SAMPLE_BYTES
}

/// Encoder/decoder for fixed-length sample frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCodec {
    block_len: usize,
}

impl BlockCodec {
    pub fn new(block_len: usize) -> Self {
        Self { block_len }
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Size of one frame on the wire
    pub fn frame_len(&self) -> usize {
        block_bytes(self.block_len)
    }

    /// Encode `samples` into a caller-owned byte slice
    pub fn encode_into(&self, samples: &[f32], dst: &mut [u8]) -> Result<(), NetworkError> {
        self.check_samples(samples.len())?;
        self.check_frame(dst.len())?;

        for (chunk, sample) in dst.chunks_exact_mut(SAMPLE_BYTES).zip(samples) {
            chunk.copy_from_slice(&sample.to_ne_bytes());
        }
        Ok(())
    }

    /// Append the encoding of `samples` to `dst`
    pub fn encode(&self, samples: &[f32], dst: &mut BytesMut) -> Result<(), NetworkError> {
        self.check_samples(samples.len())?;

        dst.reserve(self.frame_len());
        for &sample in samples {
            dst.put_f32_ne(sample);
        }
        Ok(())
    }

    /// Decode one frame into `out`
    pub fn decode(&self, mut src: &[u8], out: &mut [f32]) -> Result<(), NetworkError> {
        self.check_frame(src.len())?;
        self.check_samples(out.len())?;

        for sample in out.iter_mut() {
            *sample = src.get_f32_ne();
        }
        Ok(())
    }

    fn check_samples(&self, len: usize) -> Result<(), NetworkError> {
        if len != self.block_len {
            return Err(NetworkError::FrameSize {
                expected: self.frame_len(),
                actual: block_bytes(len),
            });
        }
        Ok(())
    }

    fn check_frame(&self, len: usize) -> Result<(), NetworkError> {
        if len != self.frame_len() {
            return Err(NetworkError::FrameSize {
                expected: self.frame_len(),
                actual: len,
            });
        }
        Ok(())
    }
}
