//! Interrupt-facing half of a comm port.
//!
//! The UART interrupt handler touches nothing but this: one ring per
//! direction plus the TX-pause flag, so interrupt latency is bounded by
//! a single enqueue or dequeue. All protocol state lives in
//! [`CommPort`](super::CommPort), which runs in the main loop and holds
//! a reference to its channel.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::ringbuffer::RingBuffer;

/// Byte rings shared between the UART interrupt and the main loop.
///
/// `const fn new` makes one channel per physical link usable as a
/// `static`.
pub struct CommChannel<const TX: usize, const RX: usize> {
    tx: RingBuffer<u8, TX>,
    rx: RingBuffer<u8, RX>,
    /// Remote sent XOFF; the TX interrupt stops draining until XON.
    tx_paused: AtomicBool,
}

impl<const TX: usize, const RX: usize> CommChannel<TX, RX> {
    pub const fn new() -> Self {
        Self {
            tx: RingBuffer::new(),
            rx: RingBuffer::new(),
            tx_paused: AtomicBool::new(false),
        }
    }

    /// RX interrupt entry: store one received byte. Returns `false` when
    /// the ring is full and the byte was dropped (flow control should
    /// have prevented this).
    #[inline]
    pub fn isr_rx_byte(&self, byte: u8) -> bool {
        self.rx.enqueue(byte)
    }

    /// TX interrupt entry: next byte to load into the transmit register,
    /// or `None` when the ring is drained or the remote asked us to
    /// pause. On `None` the handler disables the TX interrupt.
    #[inline]
    pub fn isr_tx_pop(&self) -> Option<u8> {
        if self.tx_paused.load(Ordering::Acquire) {
            return None;
        }
        self.tx.dequeue()
    }

    /// Main-loop side of the RX ring.
    #[inline]
    pub fn rx_dequeue(&self) -> Option<u8> {
        self.rx.dequeue()
    }

    #[inline]
    pub fn rx_len(&self) -> usize {
        self.rx.len()
    }

    /// Main-loop side of the TX ring. Returns `false` when full.
    #[inline]
    pub fn tx_enqueue(&self, byte: u8) -> bool {
        self.tx.enqueue(byte)
    }

    #[inline]
    pub fn tx_len(&self) -> usize {
        self.tx.len()
    }

    pub fn pause_tx(&self) {
        self.tx_paused.store(true, Ordering::Release);
    }

    pub fn resume_tx(&self) {
        self.tx_paused.store(false, Ordering::Release);
    }

    pub fn tx_paused(&self) -> bool {
        self.tx_paused.load(Ordering::Acquire)
    }
}

impl<const TX: usize, const RX: usize> Default for CommChannel<TX, RX> {
    fn default() -> Self {
        Self::new()
    }
}
