//! Asynchronous external-SRAM engine.
//!
//! Drives chunked DMA read/write/fill against one serial SRAM device
//! (23-series style: READ 0x03, WRITE 0x02, WRMR 0x01). One outstanding
//! operation:
//!
//! ```text
//! Idle ──start──▶ Busy(Command | Read | Write | Fill) ──last chunk──▶ Idle
//! ```
//!
//! Every operation begins with an initiation packet (command byte plus
//! 24-bit address) and then advances in hardware-bounded chunks, one
//! per DMA completion. The engine never blocks and never retains a
//! borrow across main-loop passes: whoever started the operation calls
//! [`SramEngine::service`] each pass, re-presenting the operation's
//! source or destination slice.
//!
//! Validation is synchronous and lenient: oversized requests are
//! clamped to the destination and to the remaining device capacity
//! rather than failed. Starting while busy is rejected, not fatal. A
//! stuck device is the scheduler's problem (task timeout), not ours.

use crate::hal::SramDma;

/// Device capacity of the fitted part, bytes.
pub const SRAM_CAPACITY: u32 = 0x2_0000;

/// DMA buffer cap for read/write chunks, bytes.
pub const SRAM_DATA_CHUNK: usize = 256;

/// DMA cap for fill chunks (no buffer copy, so larger), bytes.
pub const SRAM_FILL_CHUNK: usize = 1024;

const CMD_READ: u8 = 0x03;
const CMD_WRITE: u8 = 0x02;
const CMD_WRMR: u8 = 0x01;

/// Device write granularity, set once via WRMR.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SramMode {
    /// One byte per write instruction.
    Word,
    /// Sequential writes within a 32-byte page.
    Page,
    /// Unlimited sequential writes.
    Burst,
}

impl SramMode {
    /// Mode register byte: mode bits in the top two positions.
    pub fn to_byte(self) -> u8 {
        match self {
            SramMode::Word => 0b00 << 6,
            SramMode::Page => 0b10 << 6,
            SramMode::Burst => 0b01 << 6,
        }
    }
}

/// Per-instance geometry. Explicit configuration, not global constants.
#[derive(Clone, Copy, Debug)]
pub struct SramConfig {
    pub capacity: u32,
    pub data_chunk: usize,
    pub fill_chunk: usize,
}

impl Default for SramConfig {
    fn default() -> Self {
        Self {
            capacity: SRAM_CAPACITY,
            data_chunk: SRAM_DATA_CHUNK,
            fill_chunk: SRAM_FILL_CHUNK,
        }
    }
}

/// Operation currently occupying the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SramOp {
    Command,
    Read,
    Write,
    Fill,
}

/// Outcome of attempting to start an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartStatus {
    Started,
    /// Another operation is in flight. Reported, not fatal; retry later.
    Busy,
    /// Synchronous validation failure (zero length, bad address).
    Rejected,
}

/// What `service` observed this pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SramEvent {
    /// No operation in flight.
    Idle,
    /// Operation still advancing (transfer in flight or chunk issued).
    InFlight,
    /// WRMR command completed.
    ModeSet,
    /// Read finished; `len` is the final transferred length for the
    /// caller to store into its destination buffer.
    ReadComplete { len: usize },
    WriteComplete,
    FillComplete,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Initiation packet in flight.
    Init,
    /// Data chunks in flight.
    Data,
}

/// The engine. One per device; created once at startup.
pub struct SramEngine {
    config: SramConfig,
    op: Option<SramOp>,
    phase: Phase,
    /// Current device address; advances chunk by chunk.
    address: u32,
    /// Total length of the operation after clamping.
    data_length: u32,
    bytes_remaining: u32,
    /// Offset into the owner's buffer, for read/write chunk slicing.
    transferred: usize,
    fill_value: u8,
    /// Tick the current operation started at (stuck-device diagnosis).
    start_tick: u32,
}

impl SramEngine {
    pub const fn new(config: SramConfig) -> Self {
        Self {
            config,
            op: None,
            phase: Phase::Init,
            address: 0,
            data_length: 0,
            bytes_remaining: 0,
            transferred: 0,
            fill_value: 0,
            start_tick: 0,
        }
    }

    /// Busy for the operation's entire lifetime; a second operation may
    /// not start while set.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.op.is_some()
    }

    #[inline]
    pub fn current_op(&self) -> Option<SramOp> {
        self.op
    }

    #[inline]
    pub fn start_tick(&self) -> u32 {
        self.start_tick
    }

    #[inline]
    pub fn config(&self) -> &SramConfig {
        &self.config
    }

    /// One-shot device configuration (WRMR).
    pub fn set_mode<D: SramDma>(&mut self, dma: &mut D, mode: SramMode, now: u32) -> StartStatus {
        if self.is_busy() {
            return StartStatus::Busy;
        }
        self.op = Some(SramOp::Command);
        self.phase = Phase::Init;
        self.bytes_remaining = 0;
        self.data_length = 0;
        self.start_tick = now;
        dma.begin_command(&[CMD_WRMR, mode.to_byte()]);
        StartStatus::Started
    }

    /// Start a chunked read of `length` bytes at `address`.
    ///
    /// `dest_capacity` is the owner's buffer capacity; the length is
    /// clamped to it and to the remaining device capacity (truncate
    /// rather than fail). The owner passes the same buffer to every
    /// subsequent `service` call.
    pub fn read<D: SramDma>(
        &mut self,
        dma: &mut D,
        address: u32,
        length: u32,
        dest_capacity: usize,
        now: u32,
    ) -> StartStatus {
        if self.is_busy() {
            return StartStatus::Busy;
        }
        if length == 0 || address >= self.config.capacity {
            return StartStatus::Rejected;
        }
        let length = length
            .min(dest_capacity as u32)
            .min(self.config.capacity - address);

        self.begin(SramOp::Read, address, length, now);
        dma.begin_command(&init_packet(CMD_READ, address));
        StartStatus::Started
    }

    /// Start a chunked write of `length` bytes to `address`.
    ///
    /// Refuses to start (no-op) when the write would cross the device
    /// capacity boundary.
    pub fn write<D: SramDma>(
        &mut self,
        dma: &mut D,
        address: u32,
        length: usize,
        now: u32,
    ) -> StartStatus {
        if self.is_busy() {
            return StartStatus::Busy;
        }
        if length == 0 || address >= self.config.capacity {
            return StartStatus::Rejected;
        }
        if address + length as u32 > self.config.capacity {
            return StartStatus::Rejected;
        }

        self.begin(SramOp::Write, address, length as u32, now);
        dma.begin_command(&init_packet(CMD_WRITE, address));
        StartStatus::Started
    }

    /// Repeat `value` over `length` device bytes starting at `address`.
    /// Length clamps to the remaining capacity.
    pub fn fill<D: SramDma>(
        &mut self,
        dma: &mut D,
        address: u32,
        length: u32,
        value: u8,
        now: u32,
    ) -> StartStatus {
        if self.is_busy() {
            return StartStatus::Busy;
        }
        if length == 0 || address >= self.config.capacity {
            return StartStatus::Rejected;
        }
        let length = length.min(self.config.capacity - address);

        self.fill_value = value;
        self.begin(SramOp::Fill, address, length, now);
        dma.begin_command(&init_packet(CMD_WRITE, address));
        StartStatus::Started
    }

    fn begin(&mut self, op: SramOp, address: u32, length: u32, now: u32) {
        self.op = Some(op);
        self.phase = Phase::Init;
        self.address = address;
        self.data_length = length;
        self.bytes_remaining = length;
        self.transferred = 0;
        self.start_tick = now;
    }

    /// The continuation dispatcher. Called once per main-loop pass by
    /// the operation's owner; `data` is the operation's source (write)
    /// or destination (read) buffer, ignored for command and fill.
    ///
    /// Each completed transfer either issues the next chunk or, at zero
    /// bytes remaining, clears busy and reports the completion event.
    pub fn service<D: SramDma>(&mut self, dma: &mut D, data: &mut [u8]) -> SramEvent {
        let op = match self.op {
            Some(op) => op,
            None => return SramEvent::Idle,
        };
        if dma.is_busy() {
            return SramEvent::InFlight;
        }

        if op == SramOp::Command {
            self.op = None;
            return SramEvent::ModeSet;
        }

        if self.phase == Phase::Init {
            self.phase = Phase::Data;
        } else if self.bytes_remaining == 0 {
            return self.finish(op);
        }

        let cap = match op {
            SramOp::Fill => self.config.fill_chunk,
            _ => self.config.data_chunk,
        };
        let mut chunk = (self.bytes_remaining as usize).min(cap);
        if op != SramOp::Fill {
            // The owner's buffer bounds the transfer as well.
            chunk = chunk.min(data.len().saturating_sub(self.transferred));
            if chunk == 0 {
                return self.finish(op);
            }
        }

        match op {
            SramOp::Read => {
                dma.begin_read(self.address, &mut data[self.transferred..self.transferred + chunk])
            }
            SramOp::Write => {
                dma.begin_write(self.address, &data[self.transferred..self.transferred + chunk])
            }
            SramOp::Fill => dma.begin_fill(self.address, self.fill_value, chunk),
            SramOp::Command => unreachable!(),
        }

        self.bytes_remaining -= chunk as u32;
        self.address += chunk as u32;
        self.transferred += chunk;
        SramEvent::InFlight
    }

    fn finish(&mut self, op: SramOp) -> SramEvent {
        self.op = None;
        match op {
            SramOp::Read => SramEvent::ReadComplete {
                len: self.transferred,
            },
            SramOp::Write => SramEvent::WriteComplete,
            SramOp::Fill => SramEvent::FillComplete,
            SramOp::Command => SramEvent::ModeSet,
        }
    }
}

/// Command byte followed by the 24-bit address, MSB first.
fn init_packet(command: u8, address: u32) -> [u8; 4] {
    [
        command,
        (address >> 16) as u8,
        (address >> 8) as u8,
        address as u8,
    ]
}
