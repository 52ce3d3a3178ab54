//! Fault and warning reporting.
//!
//! Every reportable condition in the firmware lands here: the comm
//! layer's dequeue errors, scheduler task timeouts, unrecognized shell
//! input. Records carry a code plus up to four numeric context values
//! (address, length, task id, elapsed time — meaning depends on the
//! code) and the tick they were raised at.
//!
//! The original single most-recent-slot pair lost every fault that was
//! followed by another before the render pass; records now go through a
//! small overwrite-oldest ring drained once per main-loop pass, while
//! `last_warning`/`last_error` keep the old query surface.
//!
//! Nothing here is fatal by design.

use crate::ringbuffer::{OverflowPolicy, RingBuffer};

/// Capacity of the fault ring.
pub const FAULT_LOG_DEPTH: usize = 8;

/// Number of numeric context values per record.
pub const FAULT_VALUE_COUNT: usize = 4;

/// Reportable condition codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultCode {
    /// Dequeued line was larger than the caller's scratch buffer;
    /// delivered truncated. Warning.
    DataTruncated = 1,

    /// SRAM operation requested while the engine was busy.
    SramBusy = 2,

    /// Zero-length request on a path that names its errors.
    ZeroLength = 3,

    /// Address or range outside the device capacity.
    AddressRange = 4,

    /// Line dequeue with nothing queued.
    LineQueueEmpty = 5,

    /// Shell input did not match any command.
    UnknownCommand = 6,

    /// Task stayed busy past its timeout budget and was retired.
    TaskTimeout = 7,
}

impl FaultCode {
    /// Warnings are recoverable degradations; errors are refused
    /// operations.
    pub fn is_warning(self) -> bool {
        matches!(self, FaultCode::DataTruncated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FaultCode::DataTruncated => "data truncated",
            FaultCode::SramBusy => "sram busy",
            FaultCode::ZeroLength => "zero length",
            FaultCode::AddressRange => "address out of range",
            FaultCode::LineQueueEmpty => "line queue empty",
            FaultCode::UnknownCommand => "unknown command",
            FaultCode::TaskTimeout => "task timeout",
        }
    }
}

/// One reported fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaultRecord {
    pub code: FaultCode,
    /// Context values; unused slots are zero.
    pub values: [u32; FAULT_VALUE_COUNT],
    /// Millisecond tick at report time.
    pub tick: u32,
}

/// Bounded fault history: overwrite-oldest ring plus most-recent
/// warning/error slots.
pub struct FaultLog {
    ring: RingBuffer<FaultRecord, FAULT_LOG_DEPTH>,
    last_warning: Option<FaultRecord>,
    last_error: Option<FaultRecord>,
    /// Total faults since boot (never cleared).
    total: u32,
}

impl FaultLog {
    pub const fn new() -> Self {
        Self {
            ring: RingBuffer::with_policy(OverflowPolicy::Overwrite),
            last_warning: None,
            last_error: None,
            total: 0,
        }
    }

    /// Record a fault. Never blocks; the ring drops its oldest entry
    /// when full.
    pub fn report(&mut self, code: FaultCode, values: [u32; FAULT_VALUE_COUNT], tick: u32) {
        let record = FaultRecord { code, values, tick };
        if code.is_warning() {
            self.last_warning = Some(record);
        } else {
            self.last_error = Some(record);
        }
        self.total = self.total.wrapping_add(1);
        self.ring.enqueue(record);
    }

    /// Shorthand for a single-value report.
    pub fn report1(&mut self, code: FaultCode, value: u32, tick: u32) {
        self.report(code, [value, 0, 0, 0], tick);
    }

    /// Pop the oldest undrained record. The render pass calls this until
    /// empty, once per main-loop iteration.
    pub fn drain(&mut self) -> Option<FaultRecord> {
        self.ring.dequeue()
    }

    pub fn pending(&self) -> usize {
        self.ring.len()
    }

    pub fn last_warning(&self) -> Option<FaultRecord> {
        self.last_warning
    }

    pub fn last_error(&self) -> Option<FaultRecord> {
        self.last_error
    }

    /// Total faults since boot.
    pub fn total(&self) -> u32 {
        self.total
    }
}

impl Default for FaultLog {
    fn default() -> Self {
        Self::new()
    }
}
