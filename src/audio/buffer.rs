//! Lock-free ring buffer for audio blocks
//!
//! This implements a single-producer single-consumer (SPSC) ring of
//! fixed-length blocks, safe to drive from a real-time audio callback.
//!
//! The ring has `CAPACITY` slots and two indices. One slot is always left
//! empty so that `write == read` means empty and `write + 1 == read` means
//! full, which leaves `CAPACITY - 1` blocks of usable storage.
//!
//! Ordering contract: the producer copies the payload into its slot and only
//! then publishes the new write index with `Release`; the consumer loads the
//! write index with `Acquire` before touching the payload. The same pairing
//! in the other direction hands a slot back to the producer once the consumer
//! has finished copying out of it.

use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::audio::block::Block;

struct Shared<const CAPACITY: usize> {
    slots: Box<[UnsafeCell<Block>]>,
    block_len: usize,
    write_index: CachePadded<AtomicUsize>,
    read_index: CachePadded<AtomicUsize>,
    /// Blocks rejected because the ring was full
    dropped: AtomicU64,
}

// SAFETY: a slot is only ever accessed by the side that currently owns it.
// The producer owns slots in `[write, read - 1)`, the consumer owns slots in
// `[read, write)`, and ownership moves through the acquire/release index
// stores. `BlockProducer` and `BlockConsumer` are not `Clone`, so there is
// exactly one thread on each side.
unsafe impl<const CAPACITY: usize> Sync for Shared<CAPACITY> {}

impl<const CAPACITY: usize> Shared<CAPACITY> {
    fn len(&self) -> usize {
        let write = self.write_index.load(Ordering::Acquire);
        let read = self.read_index.load(Ordering::Acquire);
        (write + CAPACITY - read) % CAPACITY
    }
}

/// Fixed-capacity block ring, allocated once and split into its two ends
pub struct RingBuffer<const CAPACITY: usize> {
    shared: Arc<Shared<CAPACITY>>,
}

impl<const CAPACITY: usize> RingBuffer<CAPACITY> {
    /// One slot is reserved to tell full from empty
    const VALID_CAPACITY: () = assert!(CAPACITY >= 2, "Ring capacity must be at least 2");

    /// Create a ring whose slots each hold `block_len` samples
    ///
    /// A `CAPACITY` below 2 is rejected at compile time.
    pub fn new(block_len: usize) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_CAPACITY;

        let slots = (0..CAPACITY)
            .map(|_| UnsafeCell::new(Block::zeroed(block_len)))
            .collect();

        Self {
            shared: Arc::new(Shared {
                slots,
                block_len,
                write_index: CachePadded::new(AtomicUsize::new(0)),
                read_index: CachePadded::new(AtomicUsize::new(0)),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Read-only view for diagnostics
    pub fn monitor(&self) -> RingMonitor<CAPACITY> {
        RingMonitor {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Split into producer and consumer ends
    pub fn split(self) -> (BlockProducer<CAPACITY>, BlockConsumer<CAPACITY>) {
        (
            BlockProducer {
                shared: Arc::clone(&self.shared),
            },
            BlockConsumer {
                shared: self.shared,
            },
        )
    }
}

/// Producer end of a block ring (exactly one per ring)
pub struct BlockProducer<const CAPACITY: usize> {
    shared: Arc<Shared<CAPACITY>>,
}

impl<const CAPACITY: usize> BlockProducer<CAPACITY> {
    /// Copy `block` into the ring
    ///
    /// Returns false without touching the ring if it is full (the block is
    /// counted as dropped) or if `block` is not exactly one block long.
    /// Never blocks and never allocates.
    pub fn push(&mut self, block: &[f32]) -> bool {
        let shared = &*self.shared;
        if block.len() != shared.block_len {
            return false;
        }

        let write = shared.write_index.load(Ordering::Relaxed);
        let next = (write + 1) % CAPACITY;
        if next == shared.read_index.load(Ordering::Acquire) {
            shared.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        // SAFETY: `write` is outside `[read, write)`, so the consumer cannot
        // observe this slot until the release store below.
        unsafe {
            (*shared.slots[write].get()).copy_from_slice(block);
        }
        shared.write_index.store(next, Ordering::Release);
        true
    }

    pub fn monitor(&self) -> RingMonitor<CAPACITY> {
        RingMonitor {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Consumer end of a block ring (exactly one per ring)
pub struct BlockConsumer<const CAPACITY: usize> {
    shared: Arc<Shared<CAPACITY>>,
}

impl<const CAPACITY: usize> BlockConsumer<CAPACITY> {
    /// Copy the oldest block into `out`
    ///
    /// Returns false and leaves `out` untouched if the ring is empty or if
    /// `out` is not exactly one block long. Never blocks and never allocates.
    pub fn pop(&mut self, out: &mut [f32]) -> bool {
        let shared = &*self.shared;
        if out.len() != shared.block_len {
            return false;
        }

        let read = shared.read_index.load(Ordering::Relaxed);
        if read == shared.write_index.load(Ordering::Acquire) {
            return false;
        }

        // SAFETY: `read` is inside `[read, write)`; the producer published
        // this slot with a release store and will not reuse it until the
        // read index moves past it.
        unsafe {
            out.copy_from_slice(&*shared.slots[read].get());
        }
        shared
            .read_index
            .store((read + 1) % CAPACITY, Ordering::Release);
        true
    }

    pub fn monitor(&self) -> RingMonitor<CAPACITY> {
        RingMonitor {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Shared, read-only handle for ring statistics
#[derive(Clone)]
pub struct RingMonitor<const CAPACITY: usize> {
    shared: Arc<Shared<CAPACITY>>,
}

impl<const CAPACITY: usize> RingMonitor<CAPACITY> {
    /// Blocks currently queued (a snapshot; may be stale immediately)
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Usable capacity in blocks
    pub fn capacity(&self) -> usize {
        CAPACITY - 1
    }

    /// Samples per block
    pub fn block_len(&self) -> usize {
        self.shared.block_len
    }

    /// Number of pushes rejected because the ring was full
    pub fn dropped_count(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Get fill level as a fraction of usable capacity
    pub fn fill_level(&self) -> f32 {
        self.len() as f32 / self.capacity() as f32
    }
}
