//! Fixed-capacity circular FIFO shared between one interrupt actor and
//! one main-loop actor.
//!
//! # Concurrency contract
//!
//! ```text
//! ISR side  ──enqueue──▶ [ RingBuffer ] ──dequeue──▶ main loop   (RX)
//! main loop ──enqueue──▶ [ RingBuffer ] ──dequeue──▶ ISR side    (TX)
//! ```
//!
//! Exactly one producer and one consumer, each on its own side. The
//! producer owns `head`, the consumer owns `tail`, and the shared `len`
//! is updated with a single atomic release operation issued only after
//! the dependent index change, so the other side never observes an
//! inconsistent (length, index) pair. No locks anywhere.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicUsize, Ordering};

/// What `enqueue` does when the buffer is full.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Drop the new item. The only policy legal for an interrupt-side
    /// producer: the consumer's index is never touched.
    Reject,
    /// Overwrite the oldest item and advance the read index. Legal only
    /// when producer and consumer run in the same context (e.g. the
    /// main-loop-only line-length queue), since it writes `tail`.
    Overwrite,
}

/// SPSC ring buffer over preallocated storage.
///
/// Created once, never destroyed; `const fn new` makes it usable as a
/// `static`. All operations are O(1) and never allocate.
pub struct RingBuffer<T, const N: usize> {
    slots: UnsafeCell<[MaybeUninit<T>; N]>,
    /// Index of the next slot to write. Producer-owned.
    head: AtomicUsize,
    /// Index of the oldest element. Consumer-owned.
    tail: AtomicUsize,
    /// Element count. Incremented by the producer, decremented by the
    /// consumer, always after the owning index has been updated.
    len: AtomicUsize,
    policy: OverflowPolicy,
}

// SAFETY: single producer and single consumer on disjoint index fields;
// the shared length is atomic. See module docs.
unsafe impl<T: Send, const N: usize> Sync for RingBuffer<T, N> {}
unsafe impl<T: Send, const N: usize> Send for RingBuffer<T, N> {}

impl<T, const N: usize> RingBuffer<T, N> {
    /// Create an empty buffer with the [`OverflowPolicy::Reject`] policy.
    pub const fn new() -> Self {
        Self::with_policy(OverflowPolicy::Reject)
    }

    /// Create an empty buffer with an explicit overflow policy.
    pub const fn with_policy(policy: OverflowPolicy) -> Self {
        assert!(N > 0, "capacity must be non-zero");
        Self {
            slots: UnsafeCell::new(unsafe { MaybeUninit::uninit().assume_init() }),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            len: AtomicUsize::new(0),
            policy,
        }
    }

    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Slot index the next `enqueue` will occupy (mod capacity).
    ///
    /// The external line queue uses this to address the SRAM block a
    /// just-queued line lands in.
    #[inline]
    pub fn write_index(&self) -> usize {
        self.head.load(Ordering::Relaxed)
    }

    /// Slot index of the oldest element (mod capacity).
    #[inline]
    pub fn read_index(&self) -> usize {
        self.tail.load(Ordering::Relaxed)
    }
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    /// Append an item. Returns `false` only when the buffer is full and
    /// the policy is `Reject`.
    ///
    /// Producer side only.
    #[inline]
    pub fn enqueue(&self, item: T) -> bool {
        if self.len.load(Ordering::Acquire) == N {
            match self.policy {
                OverflowPolicy::Reject => return false,
                OverflowPolicy::Overwrite => {
                    // Same-context only: claims the consumer's slot.
                    let tail = self.tail.load(Ordering::Relaxed);
                    self.tail.store((tail + 1) % N, Ordering::Relaxed);
                    let head = self.head.load(Ordering::Relaxed);
                    // SAFETY: slot is ours, old value is Copy (no drop).
                    unsafe {
                        (*self.slots.get())[head] = MaybeUninit::new(item);
                    }
                    self.head.store((head + 1) % N, Ordering::Relaxed);
                    return true;
                }
            }
        }

        let head = self.head.load(Ordering::Relaxed);
        // SAFETY: len < N, so this slot is not visible to the consumer.
        unsafe {
            (*self.slots.get())[head] = MaybeUninit::new(item);
        }
        self.head.store((head + 1) % N, Ordering::Relaxed);
        // Publish after the slot and index are in place.
        self.len.fetch_add(1, Ordering::Release);
        true
    }

    /// Remove and return the oldest item, or `None` if empty.
    ///
    /// Consumer side only.
    #[inline]
    pub fn dequeue(&self) -> Option<T> {
        if self.len.load(Ordering::Acquire) == 0 {
            return None;
        }
        let tail = self.tail.load(Ordering::Relaxed);
        // SAFETY: len > 0, so the slot at tail was published by the
        // producer before the len increment we just observed.
        let item = unsafe { (*self.slots.get())[tail].assume_init() };
        self.tail.store((tail + 1) % N, Ordering::Relaxed);
        self.len.fetch_sub(1, Ordering::Release);
        Some(item)
    }

    /// Read the item `index` positions past the oldest without removing
    /// it. `None` when out of range.
    ///
    /// Consumer side only.
    #[inline]
    pub fn peek(&self, index: usize) -> Option<T> {
        if index >= self.len.load(Ordering::Acquire) {
            return None;
        }
        let tail = self.tail.load(Ordering::Relaxed);
        // SAFETY: index < len, slot published (see dequeue).
        Some(unsafe { (*self.slots.get())[(tail + index) % N].assume_init() })
    }

    /// Discard the `count` most recently enqueued items (rewinds the
    /// write position). Discards everything if `count` exceeds the
    /// current length.
    ///
    /// Producer side only.
    pub fn remove_last(&self, count: usize) {
        let len = self.len.load(Ordering::Acquire);
        if len == 0 {
            return;
        }
        let count = count.min(len);
        let head = self.head.load(Ordering::Relaxed);
        self.head.store((head + N - count) % N, Ordering::Relaxed);
        self.len.fetch_sub(count, Ordering::Release);
    }

    /// Drop all buffered items. Same-context only (writes both indices).
    pub fn clear(&self) {
        let head = self.head.load(Ordering::Relaxed);
        self.tail.store(head, Ordering::Relaxed);
        self.len.store(0, Ordering::Release);
    }
}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
