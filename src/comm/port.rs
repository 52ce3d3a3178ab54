//! Per-link protocol state machine.
//!
//! Byte-at-a-time processing driven from the main loop only; the
//! interrupt handler just moves raw bytes through the
//! [`CommChannel`](super::CommChannel) rings. Each pass of
//! [`CommPort::update`] runs flow control, drains RX into the line
//! buffer (escape sequences, backspace, newline matching), and advances
//! any flush of a completed line to external SRAM.
//!
//! A completed line stalls intake until it is consumed: taken by the
//! local consumer, or flushed to the port's external block ring. Flushes
//! wait for the SRAM engine rather than dropping data; backpressure
//! propagates to the remote end through XOFF when RX fills up.

use crate::buffer::LineBuffer;
use crate::fault::{FaultCode, FaultLog};
use crate::hal::{SramDma, Uart};
use crate::sram::{SramEngine, SramEvent, StartStatus};

use super::ascii;
use super::channel::CommChannel;
use super::escape::{EscapeParser, EscapeProgress};
use super::external::ExternalLineQueue;
use super::LineTermination;

/// Port behavior switches. All runtime-changeable.
#[derive(Clone, Copy, Debug)]
pub struct CommConfig {
    pub rx_newline: LineTermination,
    pub tx_newline: LineTermination,
    /// Echo received data bytes back to the sender.
    pub echo_rx: bool,
    /// Echo the TX newline when a received line completes.
    pub echo_newline: bool,
    /// Echo completed escape sequences verbatim.
    pub echo_sequence: bool,
    /// Pass control bytes through as line data; lines complete only at
    /// buffer capacity.
    pub binary: bool,
    /// Discard everything received (flow-control bytes still apply).
    pub ignore_rx: bool,
}

impl Default for CommConfig {
    fn default() -> Self {
        Self {
            rx_newline: LineTermination::CrLf,
            tx_newline: LineTermination::CrLf,
            echo_rx: false,
            echo_newline: false,
            echo_sequence: false,
            binary: false,
            ignore_rx: false,
        }
    }
}

/// SRAM engine interaction this port currently owns. The owner of an
/// operation is the one that services it.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Transfer {
    None,
    /// Completed line being written to the external block ring.
    Flush,
    /// Queued line being read back into caller scratch.
    Dequeue,
}

/// One serial link's protocol state.
///
/// `TX`/`RX` are the channel ring capacities, `LINE` the line buffer
/// capacity, `QD` the external block-ring depth.
pub struct CommPort<'a, const TX: usize, const RX: usize, const LINE: usize, const QD: usize> {
    channel: &'a CommChannel<TX, RX>,
    config: CommConfig,
    line: LineBuffer<LINE>,
    escape: EscapeParser,
    /// Bytes of the RX newline pattern matched so far.
    nl_matched: usize,
    has_line: bool,
    /// We sent XOFF and have not yet sent the matching XON.
    rx_paused: bool,
    high_water: usize,
    low_water: usize,
    external: Option<ExternalLineQueue<QD>>,
    transfer: Transfer,
    /// Total bytes processed since creation (diagnostics).
    rx_byte_count: u32,
}

impl<'a, const TX: usize, const RX: usize, const LINE: usize, const QD: usize>
    CommPort<'a, TX, RX, LINE, QD>
{
    pub fn new(channel: &'a CommChannel<TX, RX>, config: CommConfig) -> Self {
        Self {
            channel,
            config,
            line: LineBuffer::new(),
            escape: EscapeParser::new(),
            nl_matched: 0,
            has_line: false,
            rx_paused: false,
            high_water: 3 * RX / 4,
            low_water: RX / 4,
            external: None,
            transfer: Transfer::None,
            rx_byte_count: 0,
        }
    }

    /// Attach an external block ring: `QD` blocks of `block_size` bytes
    /// at `base_address`. Completed lines flush there instead of waiting
    /// for a local consumer; `block_size` must cover the line buffer.
    pub fn with_external_storage(mut self, base_address: u32, block_size: u32) -> Self {
        self.external = Some(ExternalLineQueue::new(base_address, block_size));
        self
    }

    /// Override the default 3/4 / 1/4 flow-control thresholds.
    pub fn set_watermarks(&mut self, high: usize, low: usize) {
        self.high_water = high;
        self.low_water = low;
    }

    pub fn config(&self) -> &CommConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut CommConfig {
        &mut self.config
    }

    pub fn channel(&self) -> &CommChannel<TX, RX> {
        self.channel
    }

    #[inline]
    pub fn has_line(&self) -> bool {
        self.has_line
    }

    /// The completed line, empty if none.
    pub fn line(&self) -> &[u8] {
        if self.has_line {
            self.line.as_bytes()
        } else {
            &[]
        }
    }

    pub fn rx_paused(&self) -> bool {
        self.rx_paused
    }

    pub fn rx_byte_count(&self) -> u32 {
        self.rx_byte_count
    }

    pub fn queued_lines(&self) -> usize {
        self.external.as_ref().map_or(0, |ext| ext.len())
    }

    /// Copy the completed line out and reopen intake. Local consumption
    /// path for ports without external storage.
    pub fn take_line<const M: usize>(&mut self, dest: &mut LineBuffer<M>) -> bool {
        if !self.has_line {
            return false;
        }
        dest.set(self.line.as_bytes());
        self.line.clear();
        self.has_line = false;
        true
    }

    pub fn sequence_complete(&self) -> bool {
        self.escape.is_complete()
    }

    pub fn sequence_terminator(&self) -> Option<u8> {
        self.escape.terminator()
    }

    pub fn sequence_params(&self) -> &[u8] {
        self.escape.params()
    }

    /// Release the held escape sequence.
    pub fn reset_sequence(&mut self) {
        self.escape.reset();
    }

    /// One main-loop pass: flow control, RX drain, flush progress.
    pub fn update<U: Uart, D: SramDma>(
        &mut self,
        uart: &mut U,
        engine: &mut SramEngine,
        dma: &mut D,
        faults: &mut FaultLog,
        now: u32,
    ) {
        self.update_flow_control(uart);

        // A completed line stalls intake until consumed.
        while !self.has_line {
            match self.channel.rx_dequeue() {
                Some(byte) => self.process_byte(byte, uart),
                None => break,
            }
        }

        if self.has_line && self.external.is_some() {
            self.service_flush(engine, dma, faults, now);
        }
    }

    fn update_flow_control<U: Uart>(&mut self, uart: &mut U) {
        let fill = self.channel.rx_len();
        if !self.rx_paused && fill >= self.high_water {
            // Straight to the transmit register, ahead of queued traffic.
            uart.write_direct(ascii::XOFF);
            self.rx_paused = true;
        } else if self.rx_paused && fill <= self.low_water {
            uart.write_direct(ascii::XON);
            self.rx_paused = false;
        }
    }

    fn process_byte<U: Uart>(&mut self, byte: u8, uart: &mut U) {
        self.rx_byte_count = self.rx_byte_count.wrapping_add(1);

        // Remote flow control applies in every mode.
        match byte {
            ascii::XOFF => {
                self.channel.pause_tx();
                return;
            }
            ascii::XON => {
                self.channel.resume_tx();
                return;
            }
            _ => {}
        }

        if self.config.ignore_rx {
            return;
        }

        if self.config.binary {
            self.append(byte, uart);
            return;
        }

        let byte = if self.escape.active() || byte == ascii::ESC {
            match self.escape.feed(byte) {
                EscapeProgress::Consumed => return,
                EscapeProgress::Complete => {
                    if self.config.echo_sequence {
                        self.echo_sequence(uart);
                    }
                    return;
                }
                // Not a sequence after all; handle the byte normally.
                EscapeProgress::Aborted(byte) => byte,
            }
        } else {
            byte
        };

        match byte {
            ascii::BS | ascii::DEL => {
                self.line.trim_last();
                if self.config.echo_rx {
                    self.echo(byte, uart);
                }
            }
            ascii::CR | ascii::LF => self.process_newline(byte, uart),
            _ => self.append(byte, uart),
        }
    }

    /// Order-sensitive prefix match against the RX newline pattern: the
    /// line completes only when the pattern bytes arrive in sequence, so
    /// LF-then-CR never satisfies CR+LF.
    fn process_newline<U: Uart>(&mut self, byte: u8, uart: &mut U) {
        let pattern = self.config.rx_newline.pattern();
        if byte == pattern[self.nl_matched] {
            self.nl_matched += 1;
            if self.nl_matched == pattern.len() {
                self.complete_line(uart);
            }
        } else if byte == pattern[0] {
            self.nl_matched = 1;
        } else {
            // Stray CR/LF outside the pattern is discarded, not data.
            self.nl_matched = 0;
        }
    }

    fn complete_line<U: Uart>(&mut self, uart: &mut U) {
        self.nl_matched = 0;
        // Terminated lines carry a NUL sentinel; capacity-forced lines
        // have no room for one. Lengths keep both unambiguous.
        self.line.push(ascii::NUL);
        self.has_line = true;
        if self.config.echo_newline {
            for b in self.config.tx_newline.pattern() {
                self.echo(*b, uart);
            }
        }
    }

    fn append<U: Uart>(&mut self, byte: u8, uart: &mut U) {
        // A half-seen newline followed by data is not a newline.
        self.nl_matched = 0;
        self.line.push(byte);
        if self.config.echo_rx {
            self.echo(byte, uart);
        }
        if self.line.is_full() {
            // Capacity with no terminator: close and flush as-is.
            self.has_line = true;
        }
    }

    /// Best-effort echo: dropped when TX is full rather than blocking
    /// the RX drain.
    fn echo<U: Uart>(&self, byte: u8, uart: &mut U) {
        if self.channel.tx_enqueue(byte) {
            uart.set_tx_interrupt(true);
        }
    }

    fn echo_sequence<U: Uart>(&self, uart: &mut U) {
        self.echo(ascii::ESC, uart);
        self.echo(b'[', uart);
        for b in self.escape.params() {
            self.echo(*b, uart);
        }
        if let Some(t) = self.escape.terminator() {
            self.echo(t, uart);
        }
    }

    /// Advance the flush of the completed line into the external block
    /// ring. The line's block index is fixed by the queue's write index
    /// before the length is enqueued.
    fn service_flush<D: SramDma>(
        &mut self,
        engine: &mut SramEngine,
        dma: &mut D,
        faults: &mut FaultLog,
        now: u32,
    ) {
        match self.transfer {
            // Engine busy on our own dequeue; the flush waits its turn.
            Transfer::Dequeue => {}
            Transfer::Flush => {
                let len = self.line.len();
                let event = engine.service(dma, &mut self.line.storage_mut()[..len]);
                if event == SramEvent::WriteComplete {
                    self.line.clear();
                    self.has_line = false;
                    self.transfer = Transfer::None;
                }
            }
            Transfer::None => {
                let Some(ext) = self.external.as_ref() else {
                    return;
                };
                // Backpressure: a saturated queue or busy engine stalls
                // our own intake instead of dropping the line.
                if ext.is_full() || engine.is_busy() {
                    return;
                }
                let address = ext.write_address();
                match engine.write(dma, address, self.line.len(), now) {
                    StartStatus::Started => {
                        ext.push(self.line.len() as u16);
                        self.transfer = Transfer::Flush;
                    }
                    StartStatus::Busy => {}
                    StartStatus::Rejected => {
                        // Misconfigured block ring; drop the line rather
                        // than stall intake forever.
                        faults.report(
                            FaultCode::AddressRange,
                            [address, self.line.len() as u32, 0, 0],
                            now,
                        );
                        self.line.clear();
                        self.has_line = false;
                    }
                }
            }
        }
    }

    /// Start reading the oldest queued line back into caller scratch of
    /// `scratch_capacity` bytes. Unlike the engine's silent clamping,
    /// failures here raise named faults. Returns `true` when the read
    /// was issued; the caller then drives
    /// [`service_dequeue`](Self::service_dequeue) each pass.
    pub fn begin_dequeue<D: SramDma>(
        &mut self,
        engine: &mut SramEngine,
        dma: &mut D,
        faults: &mut FaultLog,
        scratch_capacity: usize,
        now: u32,
    ) -> bool {
        let Some(ext) = self.external.as_ref() else {
            return false;
        };
        let Some(len) = ext.peek_len() else {
            faults.report1(FaultCode::LineQueueEmpty, 0, now);
            return false;
        };
        if self.transfer != Transfer::None || engine.is_busy() {
            faults.report1(FaultCode::SramBusy, 0, now);
            return false;
        }
        if len == 0 {
            faults.report1(FaultCode::ZeroLength, ext.read_address(), now);
            ext.pop();
            return false;
        }

        let address = ext.read_address();
        if address + len as u32 > engine.config().capacity {
            // The entry can never be delivered; discard it.
            faults.report(FaultCode::AddressRange, [address, len as u32, 0, 0], now);
            ext.pop();
            return false;
        }
        if len as usize > scratch_capacity {
            // Delivered anyway, clamped by the engine.
            faults.report(
                FaultCode::DataTruncated,
                [len as u32, scratch_capacity as u32, 0, 0],
                now,
            );
        }

        match engine.read(dma, address, len as u32, scratch_capacity, now) {
            StartStatus::Started => {
                self.transfer = Transfer::Dequeue;
                true
            }
            _ => {
                faults.report1(FaultCode::SramBusy, address, now);
                false
            }
        }
    }

    /// Advance an in-flight dequeue; the caller re-presents the same
    /// scratch buffer each pass. Returns the delivered length on
    /// completion, after which the queue entry (and its block) is
    /// released.
    pub fn service_dequeue<D: SramDma>(
        &mut self,
        engine: &mut SramEngine,
        dma: &mut D,
        scratch: &mut [u8],
    ) -> Option<usize> {
        if self.transfer != Transfer::Dequeue {
            return None;
        }
        match engine.service(dma, scratch) {
            SramEvent::ReadComplete { len } => {
                if let Some(ext) = self.external.as_ref() {
                    ext.pop();
                }
                self.transfer = Transfer::None;
                Some(len)
            }
            _ => None,
        }
    }

    /// Queue one byte for transmit. Spins only while the TX ring is
    /// full (the interrupt drains it concurrently on hardware).
    pub fn put_char<U: Uart>(&self, uart: &mut U, byte: u8) {
        while !self.channel.tx_enqueue(byte) {
            core::hint::spin_loop();
        }
        uart.set_tx_interrupt(true);
    }

    pub fn put_bytes<U: Uart>(&self, uart: &mut U, bytes: &[u8]) {
        for b in bytes {
            self.put_char(uart, *b);
        }
    }

    pub fn put_str<U: Uart>(&self, uart: &mut U, s: &str) {
        self.put_bytes(uart, s.as_bytes());
    }

    /// Transmit `s` followed by the configured TX newline.
    pub fn put_line<U: Uart>(&self, uart: &mut U, s: &str) {
        self.put_str(uart, s);
        self.put_bytes(uart, self.config.tx_newline.pattern());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{SimSram, SimUart};
    use crate::sram::SramConfig;

    const CAP: usize = 4096;

    type TestPort<'a> = CommPort<'a, 16, 64, 16, 4>;

    struct Rig {
        uart: SimUart,
        engine: SramEngine,
        sram: SimSram<CAP>,
        faults: FaultLog,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                uart: SimUart::new(),
                engine: SramEngine::new(SramConfig {
                    capacity: CAP as u32,
                    data_chunk: 256,
                    fill_chunk: 1024,
                }),
                sram: SimSram::new(),
                faults: FaultLog::new(),
            }
        }

        fn update(&mut self, port: &mut TestPort<'_>) {
            port.update(
                &mut self.uart,
                &mut self.engine,
                &mut self.sram,
                &mut self.faults,
                0,
            );
        }

        /// Update until flushes settle, stepping the DMA between passes.
        fn settle(&mut self, port: &mut TestPort<'_>) {
            for _ in 0..32 {
                self.update(port);
                self.sram.step();
            }
        }
    }

    fn feed(ch: &CommChannel<16, 64>, bytes: &[u8]) {
        for b in bytes {
            assert!(ch.isr_rx_byte(*b));
        }
    }

    #[test]
    fn test_crlf_completes_one_line() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut port = TestPort::new(&ch, CommConfig::default());
        let mut rig = Rig::new();

        feed(&ch, b"HELLO\r\n");
        rig.update(&mut port);

        assert!(port.has_line());
        assert_eq!(port.line(), b"HELLO\0");
    }

    #[test]
    fn test_lf_then_cr_does_not_complete() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut port = TestPort::new(&ch, CommConfig::default());
        let mut rig = Rig::new();

        feed(&ch, b"HELLO\n\r");
        rig.update(&mut port);

        assert!(!port.has_line());
        // The CR opened a fresh pattern; an LF now completes it.
        feed(&ch, b"\n");
        rig.update(&mut port);
        assert!(port.has_line());
    }

    #[test]
    fn test_lone_cr_under_crlf_does_not_complete() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut port = TestPort::new(&ch, CommConfig::default());
        let mut rig = Rig::new();

        feed(&ch, b"A\rB");
        rig.update(&mut port);

        assert!(!port.has_line());
        // The interposed data byte reset the half-seen newline.
        feed(&ch, b"\n");
        rig.update(&mut port);
        assert!(!port.has_line());
        assert_eq!(port.rx_byte_count(), 4);
    }

    #[test]
    fn test_backspace_trims() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut port = TestPort::new(&ch, CommConfig::default());
        let mut rig = Rig::new();

        feed(&ch, b"AX\x08B\r\n");
        rig.update(&mut port);

        assert_eq!(port.line(), b"AB\0");
    }

    #[test]
    fn test_full_line_auto_flushes() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut port = TestPort::new(&ch, CommConfig::default());
        let mut rig = Rig::new();

        feed(&ch, b"0123456789ABCDEF"); // exactly LINE bytes, no newline
        rig.update(&mut port);

        assert!(port.has_line());
        assert_eq!(port.line(), b"0123456789ABCDEF");
    }

    #[test]
    fn test_line_stalls_intake() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut port = TestPort::new(&ch, CommConfig::default());
        let mut rig = Rig::new();

        feed(&ch, b"ONE\r\nTWO\r\n");
        rig.update(&mut port);
        assert_eq!(port.line(), b"ONE\0");

        let mut taken: LineBuffer<16> = LineBuffer::new();
        assert!(port.take_line(&mut taken));
        assert!(!port.has_line());

        rig.update(&mut port);
        assert_eq!(port.line(), b"TWO\0");
    }

    #[test]
    fn test_xoff_then_xon_exactly_once() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut port = TestPort::new(&ch, CommConfig::default());
        let mut rig = Rig::new();

        // 48 = 3/4 of 64, the default high-water mark. Stray CRs under
        // CRLF are discarded, so the drain empties RX without a line
        // completing and stalling it.
        for _ in 0..48 {
            ch.isr_rx_byte(ascii::CR);
        }
        rig.update(&mut port);
        assert_eq!(rig.uart.direct_writes(), &[ascii::XOFF]);
        assert!(port.rx_paused());

        // Drained below low water: exactly one XON follows.
        rig.update(&mut port);
        assert_eq!(rig.uart.direct_writes(), &[ascii::XOFF, ascii::XON]);
        assert!(!port.rx_paused());

        rig.update(&mut port);
        assert_eq!(rig.uart.direct_writes().len(), 2);
    }

    #[test]
    fn test_remote_xoff_pauses_tx() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut port = TestPort::new(&ch, CommConfig::default());
        let mut rig = Rig::new();

        port.put_str(&mut rig.uart, "out");
        feed(&ch, &[ascii::XOFF]);
        rig.update(&mut port);

        assert!(ch.tx_paused());
        assert_eq!(ch.isr_tx_pop(), None);

        feed(&ch, &[ascii::XON]);
        rig.update(&mut port);
        assert_eq!(ch.isr_tx_pop(), Some(b'o'));
    }

    #[test]
    fn test_escape_sequence_held_data_continues() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut port = TestPort::new(&ch, CommConfig::default());
        let mut rig = Rig::new();

        feed(&ch, b"AB\x1b[3CDE\r\n");
        rig.update(&mut port);

        assert!(port.sequence_complete());
        assert_eq!(port.sequence_terminator(), Some(b'C'));
        assert_eq!(port.sequence_params(), b"3");
        // Sequence bytes never reach the line.
        assert_eq!(port.line(), b"ABDE\0");

        port.reset_sequence();
        assert!(!port.sequence_complete());
    }

    #[test]
    fn test_binary_mode_keeps_control_bytes() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut config = CommConfig::default();
        config.binary = true;
        let mut port = TestPort::new(&ch, config);
        let mut rig = Rig::new();

        feed(&ch, b"\x01\x1b\r\n\x08");
        rig.update(&mut port);

        assert!(!port.has_line());
        let mut taken: LineBuffer<16> = LineBuffer::new();
        assert!(!port.take_line(&mut taken));

        // Fill to capacity: the only way a binary line completes.
        feed(&ch, b"abcdefghijk");
        rig.update(&mut port);
        assert!(port.has_line());
        assert_eq!(port.line(), b"\x01\x1b\r\n\x08abcdefghijk");
    }

    #[test]
    fn test_ignore_rx_discards_data_not_flow_control() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut config = CommConfig::default();
        config.ignore_rx = true;
        let mut port = TestPort::new(&ch, config);
        let mut rig = Rig::new();

        feed(&ch, b"junk\r\n");
        feed(&ch, &[ascii::XOFF]);
        rig.update(&mut port);

        assert!(!port.has_line());
        assert!(ch.tx_paused());
    }

    #[test]
    fn test_echo_rx() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut config = CommConfig::default();
        config.echo_rx = true;
        let mut port = TestPort::new(&ch, config);
        let mut rig = Rig::new();

        feed(&ch, b"hi");
        rig.update(&mut port);

        assert_eq!(ch.isr_tx_pop(), Some(b'h'));
        assert_eq!(ch.isr_tx_pop(), Some(b'i'));
        assert!(rig.uart.tx_interrupt_enabled());
    }

    #[test]
    fn test_flush_and_dequeue_round_trip() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut port =
            TestPort::new(&ch, CommConfig::default()).with_external_storage(0, 16);
        let mut rig = Rig::new();

        feed(&ch, b"HELLO\r\n");
        rig.settle(&mut port);

        assert!(!port.has_line()); // flushed, intake reopened
        assert_eq!(port.queued_lines(), 1);
        assert_eq!(&rig.sram.mem()[..6], b"HELLO\0"); // block 0

        let mut scratch = [0u8; 16];
        assert!(port.begin_dequeue(
            &mut rig.engine,
            &mut rig.sram,
            &mut rig.faults,
            scratch.len(),
            0
        ));
        let mut delivered = None;
        for _ in 0..16 {
            rig.sram.step();
            if let Some(len) =
                port.service_dequeue(&mut rig.engine, &mut rig.sram, &mut scratch)
            {
                delivered = Some(len);
                break;
            }
        }
        assert_eq!(delivered, Some(6));
        assert_eq!(&scratch[..6], b"HELLO\0");
        assert_eq!(port.queued_lines(), 0);
    }

    #[test]
    fn test_second_line_lands_in_next_block() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut port =
            TestPort::new(&ch, CommConfig::default()).with_external_storage(0x100, 16);
        let mut rig = Rig::new();

        feed(&ch, b"AA\r\nBB\r\n");
        rig.settle(&mut port);

        assert_eq!(port.queued_lines(), 2);
        assert_eq!(&rig.sram.mem()[0x100..0x103], b"AA\0");
        assert_eq!(&rig.sram.mem()[0x110..0x113], b"BB\0");
    }

    #[test]
    fn test_flush_waits_for_busy_engine() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut port =
            TestPort::new(&ch, CommConfig::default()).with_external_storage(0, 16);
        let mut rig = Rig::new();

        // Occupy the engine with an unrelated fill.
        rig.engine.fill(&mut rig.sram, 0x800, 32, 0xEE, 0);

        feed(&ch, b"WAIT\r\n");
        rig.update(&mut port);
        assert!(port.has_line()); // stalled, not dropped
        assert_eq!(port.queued_lines(), 0);

        // Let the fill finish, then the flush goes through.
        let mut none: [u8; 0] = [];
        loop {
            rig.sram.step();
            match rig.engine.service(&mut rig.sram, &mut none) {
                SramEvent::InFlight => continue,
                _ => break,
            }
        }
        rig.settle(&mut port);
        assert!(!port.has_line());
        assert_eq!(port.queued_lines(), 1);
    }

    #[test]
    fn test_dequeue_empty_raises_fault() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut port =
            TestPort::new(&ch, CommConfig::default()).with_external_storage(0, 16);
        let mut rig = Rig::new();

        let mut scratch = [0u8; 16];
        assert!(!port.begin_dequeue(
            &mut rig.engine,
            &mut rig.sram,
            &mut rig.faults,
            scratch.len(),
            3
        ));
        let rec = rig.faults.last_error().unwrap();
        assert_eq!(rec.code, FaultCode::LineQueueEmpty);
        assert_eq!(rec.tick, 3);
    }

    #[test]
    fn test_dequeue_truncation_warns_and_delivers() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut port =
            TestPort::new(&ch, CommConfig::default()).with_external_storage(0, 16);
        let mut rig = Rig::new();

        feed(&ch, b"LONG LINE\r\n");
        rig.settle(&mut port);
        assert_eq!(port.queued_lines(), 1);

        let mut scratch = [0u8; 4];
        assert!(port.begin_dequeue(
            &mut rig.engine,
            &mut rig.sram,
            &mut rig.faults,
            scratch.len(),
            0
        ));
        assert_eq!(
            rig.faults.last_warning().unwrap().code,
            FaultCode::DataTruncated
        );

        let mut delivered = None;
        for _ in 0..16 {
            rig.sram.step();
            if let Some(len) =
                port.service_dequeue(&mut rig.engine, &mut rig.sram, &mut scratch)
            {
                delivered = Some(len);
                break;
            }
        }
        assert_eq!(delivered, Some(4));
        assert_eq!(&scratch, b"LONG");
    }

    #[test]
    fn test_put_line_appends_tx_newline() {
        let ch: CommChannel<16, 64> = CommChannel::new();
        let mut config = CommConfig::default();
        config.tx_newline = LineTermination::LfOnly;
        let port = TestPort::new(&ch, config);
        let mut uart = SimUart::new();

        port.put_line(&mut uart, "ok");

        assert_eq!(ch.isr_tx_pop(), Some(b'o'));
        assert_eq!(ch.isr_tx_pop(), Some(b'k'));
        assert_eq!(ch.isr_tx_pop(), Some(b'\n'));
        assert_eq!(ch.isr_tx_pop(), None);
    }
}
