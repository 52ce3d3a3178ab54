//! Hardware abstraction layer.
//!
//! Thin traits over the UART registers, the SRAM DMA channel and the
//! millisecond tick timer. Business logic stays in the core modules,
//! HAL is just I/O; the `sim` implementations let everything above this
//! line run on the host.

pub mod sim;

pub use sim::{SimClock, SimSram, SimUart};

/// Byte-level UART register access.
///
/// The interrupt handler and the flow-control path are the only users;
/// all buffered traffic goes through the comm rings instead.
pub trait Uart {
    /// Write straight to the transmit register, waiting for it to be
    /// ready. Bypasses the TX ring — used for XON/XOFF promptness.
    fn write_direct(&mut self, byte: u8);

    /// Enable or disable the transmit-ready interrupt. Enabled whenever
    /// the TX ring holds data.
    fn set_tx_interrupt(&mut self, enabled: bool);
}

/// One DMA channel wired to the external serial SRAM.
///
/// Each `begin_*` call starts a single hardware-bounded transfer and
/// returns immediately; completion is observed by polling
/// [`is_busy`](Self::is_busy). Chunking across transfers is the SRAM
/// engine's job, not the channel's.
pub trait SramDma {
    /// Clock a raw initiation packet (command byte, optional 24-bit
    /// address, optional mode byte) out to the device.
    fn begin_command(&mut self, packet: &[u8]);

    /// Device-to-memory transfer of `dest.len()` bytes starting at
    /// `address`.
    fn begin_read(&mut self, address: u32, dest: &mut [u8]);

    /// Memory-to-device transfer of `src.len()` bytes starting at
    /// `address`.
    fn begin_write(&mut self, address: u32, src: &[u8]);

    /// Repeat `value` over `len` device bytes starting at `address`
    /// (source register held fixed, destination advances).
    fn begin_fill(&mut self, address: u32, value: u8, len: usize);

    /// Transfer still in flight.
    fn is_busy(&self) -> bool;
}

/// Monotonically increasing millisecond tick.
pub trait Millis {
    fn now(&self) -> u32;
}
