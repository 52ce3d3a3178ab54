//! External-storage line queue.
//!
//! Each port owns a fixed ring of SRAM blocks, `DEPTH` blocks of
//! `block_size` bytes starting at `base_address`. A queued line lives in
//! the block matching its position in the length queue, so the queue
//! indices double as block addresses: writes land at the write index,
//! reads come from the read index.

use crate::ringbuffer::RingBuffer;

/// Per-port descriptor of the SRAM block ring plus the line-length
/// queue.
pub struct ExternalLineQueue<const DEPTH: usize> {
    base_address: u32,
    block_size: u32,
    lengths: RingBuffer<u16, DEPTH>,
}

impl<const DEPTH: usize> ExternalLineQueue<DEPTH> {
    pub const fn new(base_address: u32, block_size: u32) -> Self {
        Self {
            base_address,
            block_size,
            lengths: RingBuffer::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.lengths.is_full()
    }

    #[inline]
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Device address of the block the next queued line lands in. Only
    /// meaningful while the queue is not full.
    pub fn write_address(&self) -> u32 {
        self.base_address + self.block_size * self.lengths.write_index() as u32
    }

    /// Device address of the oldest queued line's block.
    pub fn read_address(&self) -> u32 {
        self.base_address + self.block_size * self.lengths.read_index() as u32
    }

    /// First device address past the port's block ring.
    pub fn end_address(&self) -> u32 {
        self.base_address + self.block_size * DEPTH as u32
    }

    /// Record a queued line's length. Must be called only after the
    /// line's write was issued to [`write_address`](Self::write_address).
    pub fn push(&self, length: u16) -> bool {
        self.lengths.enqueue(length)
    }

    /// Length of the oldest queued line, without consuming it.
    pub fn peek_len(&self) -> Option<u16> {
        self.lengths.peek(0)
    }

    /// Consume the oldest queue entry, releasing its block.
    pub fn pop(&self) -> Option<u16> {
        self.lengths.dequeue()
    }
}
