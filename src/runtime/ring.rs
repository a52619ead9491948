//! Fixed-capacity ring buffer with sliding-window reads
//!
//! Reconciles differing frame sizes and hops between adjacent modules:
//! a module writes incoming elements as they arrive and reads overlapping
//! analysis windows back out, consuming `hop` elements per window. Capacity
//! is fixed at construction and all storage is allocated up front, so both
//! `write` and `read_window` are allocation-free.

use super::errors::{DeliverError, DeliverResult};

/// What `write` does when the buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Cap the write at the free space; `write` returns how many elements
    /// were actually stored.
    Reject,
    /// Always store everything, dropping the oldest unread elements. A
    /// drop is remembered and surfaces as an underrun at the next windowed
    /// read, since the reader's data is gone.
    Overwrite,
}

/// Fixed-capacity circular store over elements of type `T`.
///
/// Invariant: `0 <= fill <= capacity`. The read cursor trails the write
/// cursor by exactly `fill` elements.
pub struct RingBuffer<T> {
    storage: Vec<T>,
    read_pos: usize,
    write_pos: usize,
    fill: usize,
    clobbered: bool,
    policy: OverflowPolicy,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a buffer holding up to `capacity` elements.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be positive");
        Self {
            storage: vec![T::default(); capacity],
            read_pos: 0,
            write_pos: 0,
            fill: 0,
            clobbered: false,
            policy,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Elements written but not yet consumed.
    #[inline]
    pub fn available_for_read(&self) -> usize {
        self.fill
    }

    /// Free space before the policy kicks in.
    #[inline]
    pub fn available_for_write(&self) -> usize {
        self.capacity() - self.fill
    }

    /// Append elements, advancing the write cursor. Returns the number of
    /// elements stored (always `elems.len()` under `Overwrite`).
    pub fn write(&mut self, elems: &[T]) -> usize {
        let cap = self.capacity();
        let n = match self.policy {
            OverflowPolicy::Reject => elems.len().min(self.available_for_write()),
            OverflowPolicy::Overwrite => elems.len(),
        };

        // Under Overwrite, make room by dropping the oldest unread elements.
        let overflow = (self.fill + n).saturating_sub(cap);
        if overflow > 0 {
            self.clobbered = true;
            let dropped = overflow.min(self.fill);
            self.read_pos = (self.read_pos + dropped) % cap;
            self.fill -= dropped;
        }

        // Reject stores the head of the batch (the tail is refused); an
        // Overwrite larger than the whole buffer keeps only its tail.
        let src: &[T] = match self.policy {
            OverflowPolicy::Reject => &elems[..n],
            OverflowPolicy::Overwrite => &elems[elems.len().saturating_sub(cap)..],
        };

        let first = src.len().min(cap - self.write_pos);
        self.storage[self.write_pos..self.write_pos + first].copy_from_slice(&src[..first]);
        let rest = src.len() - first;
        if rest > 0 {
            self.storage[..rest].copy_from_slice(&src[first..]);
        }

        self.write_pos = (self.write_pos + src.len()) % cap;
        self.fill += src.len();
        debug_assert!(self.fill <= cap);

        match self.policy {
            OverflowPolicy::Reject => n,
            OverflowPolicy::Overwrite => elems.len(),
        }
    }

    /// Copy the oldest unconsumed `window.len()` elements into `window` in
    /// write order, then advance the read cursor by `hop` (`hop = 0` peeks
    /// without consuming).
    ///
    /// Fails with an underrun when fewer than `window.len()` elements are
    /// available, or when an `Overwrite` write has dropped unread data
    /// since the last [`reset`](Self::reset).
    pub fn read_window(&mut self, window: &mut [T], hop: usize) -> DeliverResult {
        assert!(
            hop <= window.len(),
            "hop {} exceeds window size {} - bug in caller",
            hop,
            window.len()
        );

        let size = window.len();
        if self.clobbered || size > self.fill {
            return Err(DeliverError::Underrun {
                requested: size,
                available: self.fill,
            });
        }

        let cap = self.capacity();
        let first = size.min(cap - self.read_pos);
        window[..first].copy_from_slice(&self.storage[self.read_pos..self.read_pos + first]);
        if first < size {
            window[first..].copy_from_slice(&self.storage[..size - first]);
        }

        self.read_pos = (self.read_pos + hop) % cap;
        self.fill -= hop;
        Ok(())
    }

    /// Discard all content and clear any recorded data loss.
    pub fn reset(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
        self.fill = 0;
        self.clobbered = false;
    }
}
