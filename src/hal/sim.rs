//! Simulated peripherals.
//!
//! In-memory stand-ins for the UART registers and the SRAM DMA channel,
//! honoring the same asynchronous completion contract as the hardware.
//! Host tests (and bench harnesses) drive the full protocol stack
//! against these; nothing here allocates.

use super::{SramDma, Uart};

/// Capture depth for direct UART writes.
const SIM_UART_CAPTURE: usize = 32;

/// Simulated UART register file.
///
/// Records bytes written directly to the transmit register (the
/// flow-control path) and the TX-interrupt enable state.
pub struct SimUart {
    captured: [u8; SIM_UART_CAPTURE],
    len: usize,
    tx_interrupt: bool,
}

impl SimUart {
    pub const fn new() -> Self {
        Self {
            captured: [0; SIM_UART_CAPTURE],
            len: 0,
            tx_interrupt: false,
        }
    }

    /// Bytes written via `write_direct`, oldest first.
    pub fn direct_writes(&self) -> &[u8] {
        &self.captured[..self.len]
    }

    pub fn clear_captured(&mut self) {
        self.len = 0;
    }

    pub fn tx_interrupt_enabled(&self) -> bool {
        self.tx_interrupt
    }
}

impl Default for SimUart {
    fn default() -> Self {
        Self::new()
    }
}

impl Uart for SimUart {
    fn write_direct(&mut self, byte: u8) {
        if self.len < SIM_UART_CAPTURE {
            self.captured[self.len] = byte;
            self.len += 1;
        }
    }

    fn set_tx_interrupt(&mut self, enabled: bool) {
        self.tx_interrupt = enabled;
    }
}

/// Simulated SRAM device plus DMA channel.
///
/// Transfers apply to the backing array at `begin_*` time; completion is
/// still asynchronous: `is_busy` reports true until `step` is called,
/// so callers exercise the same poll-then-service flow as on hardware.
/// `wedge` makes the channel report busy forever (stuck-device tests).
pub struct SimSram<const CAP: usize> {
    mem: [u8; CAP],
    mode: u8,
    in_flight: bool,
    wedged: bool,
    /// Completed transfer count (chunks, not operations).
    transfers: u32,
}

impl<const CAP: usize> SimSram<CAP> {
    pub const fn new() -> Self {
        Self {
            mem: [0; CAP],
            mode: 0,
            in_flight: false,
            wedged: false,
            transfers: 0,
        }
    }

    /// Signal completion of the in-flight transfer, as the DMA interrupt
    /// would.
    pub fn step(&mut self) {
        if self.in_flight && !self.wedged {
            self.in_flight = false;
            self.transfers += 1;
        }
    }

    /// Make the channel report busy forever.
    pub fn wedge(&mut self) {
        self.wedged = true;
    }

    pub fn transfers(&self) -> u32 {
        self.transfers
    }

    /// Device mode register, as last written by a WRMR packet.
    pub fn mode(&self) -> u8 {
        self.mode
    }

    /// Direct view of device memory (test assertions).
    pub fn mem(&self) -> &[u8] {
        &self.mem
    }

    pub fn mem_mut(&mut self) -> &mut [u8] {
        &mut self.mem
    }

    fn span(&self, address: u32, len: usize) -> (usize, usize) {
        let start = (address as usize).min(CAP);
        let end = (start + len).min(CAP);
        (start, end)
    }
}

impl<const CAP: usize> Default for SimSram<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> SramDma for SimSram<CAP> {
    fn begin_command(&mut self, packet: &[u8]) {
        // WRMR: command byte then mode byte.
        if packet.first() == Some(&0x01) {
            if let Some(mode) = packet.get(1) {
                self.mode = *mode;
            }
        }
        self.in_flight = true;
    }

    fn begin_read(&mut self, address: u32, dest: &mut [u8]) {
        let (start, end) = self.span(address, dest.len());
        dest[..end - start].copy_from_slice(&self.mem[start..end]);
        self.in_flight = true;
    }

    fn begin_write(&mut self, address: u32, src: &[u8]) {
        let (start, end) = self.span(address, src.len());
        self.mem[start..end].copy_from_slice(&src[..end - start]);
        self.in_flight = true;
    }

    fn begin_fill(&mut self, address: u32, value: u8, len: usize) {
        let (start, end) = self.span(address, len);
        for b in &mut self.mem[start..end] {
            *b = value;
        }
        self.in_flight = true;
    }

    fn is_busy(&self) -> bool {
        self.in_flight
    }
}

/// Fixed-tick clock for tests: returns whatever it was last set to.
pub struct SimClock {
    now: core::cell::Cell<u32>,
}

impl SimClock {
    pub const fn new() -> Self {
        Self {
            now: core::cell::Cell::new(0),
        }
    }

    pub fn set(&self, tick: u32) {
        self.now.set(tick);
    }

    pub fn advance(&self, delta: u32) {
        self.now.set(self.now.get().wrapping_add(delta));
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Millis for SimClock {
    fn now(&self) -> u32 {
        self.now.get()
    }
}
