//! # SmartRelayModule
//!
//! Firmware core for a network-attached relay/sensor controller.
//!
//! ## Architecture
//!
//! Interrupt handlers only move single bytes through [`CommChannel`]
//! rings; everything else is a cooperative main loop:
//! drain RX → [`CommPort`] parsing (sequences, lines, flow control) →
//! completed lines overflow to external SRAM via [`SramEngine`] →
//! [`TaskScheduler`] passes poll the asynchronous state machines.
//!
//! No allocation, no locks; the only interrupt-shared structure is the
//! SPSC [`RingBuffer`]. Hardware sits behind the thin traits in
//! [`hal`], so the whole protocol stack runs on the host.

#![cfg_attr(not(test), no_std)]

pub mod arena;
pub mod buffer;
pub mod comm;
pub mod fault;
pub mod hal;
pub mod ringbuffer;
pub mod scheduler;
pub mod shell;
pub mod sram;

pub use arena::FixedArenaList;
pub use buffer::LineBuffer;
pub use comm::{CommChannel, CommConfig, CommPort, LineTermination};
pub use fault::{FaultCode, FaultLog, FaultRecord};
pub use ringbuffer::{OverflowPolicy, RingBuffer};
pub use scheduler::{TaskScheduler, TaskSpec};
pub use shell::Shell;
pub use sram::{SramConfig, SramEngine, SramEvent, SramMode};
