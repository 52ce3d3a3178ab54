//! Serial communication layer.
//!
//! Split along the interrupt boundary: [`CommChannel`] is the
//! ISR-facing pair of byte rings, [`CommPort`] the main-loop protocol
//! state machine on top of it (escape sequences, line assembly, XON/XOFF
//! flow control, overflow of completed lines to external SRAM).

pub mod channel;
pub mod escape;
pub mod external;
pub mod port;

pub use channel::CommChannel;
pub use escape::{EscapeParser, EscapeProgress, MAX_SEQUENCE_PARAMS};
pub use external::ExternalLineQueue;
pub use port::{CommConfig, CommPort};

/// ASCII control bytes the protocol layer interprets.
pub mod ascii {
    pub const NUL: u8 = 0x00;
    pub const BS: u8 = 0x08;
    pub const LF: u8 = 0x0A;
    pub const CR: u8 = 0x0D;
    /// DC1, resume transmission.
    pub const XON: u8 = 0x11;
    /// DC3, pause transmission.
    pub const XOFF: u8 = 0x13;
    pub const ESC: u8 = 0x1B;
    pub const DEL: u8 = 0x7F;
}

/// Newline pattern: matched order-sensitively on receive, emitted
/// verbatim on transmit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineTermination {
    CrLf,
    CrOnly,
    LfOnly,
}

impl LineTermination {
    pub fn pattern(self) -> &'static [u8] {
        match self {
            LineTermination::CrLf => b"\r\n",
            LineTermination::CrOnly => b"\r",
            LineTermination::LfOnly => b"\n",
        }
    }
}
