//! ANSI escape sequence recognition.
//!
//! ESC arms detection; the next byte must be `[` (the CSI prefix) or
//! the sequence aborts and the byte falls back to normal handling.
//! Parameter bytes 0x30–0x3F accumulate until a letter terminates the
//! sequence. The completed sequence is held until the consumer resets
//! it.

use super::ascii;

/// Parameter bytes retained per sequence; excess is dropped.
pub const MAX_SEQUENCE_PARAMS: usize = 8;

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    /// Got ESC.
    Escaped,
    /// Got ESC [; accumulating parameters.
    Params,
}

/// What a fed byte did to the parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscapeProgress {
    /// Byte absorbed into the sequence in progress.
    Consumed,
    /// Not a sequence after all; the caller handles this byte normally.
    Aborted(u8),
    /// Terminator received; sequence held until [`EscapeParser::reset`].
    Complete,
}

pub struct EscapeParser {
    state: State,
    params: [u8; MAX_SEQUENCE_PARAMS],
    param_len: usize,
    param_count: usize,
    terminator: Option<u8>,
}

impl EscapeParser {
    pub const fn new() -> Self {
        Self {
            state: State::Idle,
            params: [0; MAX_SEQUENCE_PARAMS],
            param_len: 0,
            param_count: 0,
            terminator: None,
        }
    }

    /// Sequence currently being accumulated.
    #[inline]
    pub fn active(&self) -> bool {
        self.state != State::Idle
    }

    /// Completed sequence waiting for the consumer.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.terminator.is_some()
    }

    /// Parameter bytes of the held sequence.
    pub fn params(&self) -> &[u8] {
        &self.params[..self.param_len]
    }

    /// Total parameter bytes seen, including any dropped past the
    /// retention limit.
    pub fn param_count(&self) -> usize {
        self.param_count
    }

    pub fn terminator(&self) -> Option<u8> {
        self.terminator
    }

    /// Discard the held sequence and return to idle.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.param_len = 0;
        self.param_count = 0;
        self.terminator = None;
    }

    /// Advance the parser by one byte. Callers feed ESC to arm, then
    /// every following byte until `Complete` or `Aborted`.
    pub fn feed(&mut self, byte: u8) -> EscapeProgress {
        match self.state {
            State::Idle => {
                if byte == ascii::ESC {
                    // A new ESC overwrites any sequence still held.
                    self.reset();
                    self.state = State::Escaped;
                    EscapeProgress::Consumed
                } else {
                    EscapeProgress::Aborted(byte)
                }
            }
            State::Escaped => {
                if byte == b'[' {
                    self.state = State::Params;
                    EscapeProgress::Consumed
                } else {
                    self.state = State::Idle;
                    EscapeProgress::Aborted(byte)
                }
            }
            State::Params => match byte {
                0x30..=0x3F => {
                    if self.param_len < MAX_SEQUENCE_PARAMS {
                        self.params[self.param_len] = byte;
                        self.param_len += 1;
                    }
                    self.param_count += 1;
                    EscapeProgress::Consumed
                }
                0x41..=0x5A | 0x61..=0x7A => {
                    self.terminator = Some(byte);
                    self.state = State::Idle;
                    EscapeProgress::Complete
                }
                other => {
                    self.state = State::Idle;
                    self.param_len = 0;
                    self.param_count = 0;
                    EscapeProgress::Aborted(other)
                }
            },
        }
    }
}

impl Default for EscapeParser {
    fn default() -> Self {
        Self::new()
    }
}
