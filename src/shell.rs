//! Line-oriented command shell.
//!
//! Sits on a terminal-facing [`CommPort`]: takes each completed line,
//! matches it (case-insensitively) against a fixed command table and
//! writes the response back through the port. Unrecognized input raises
//! [`FaultCode::UnknownCommand`]. No history, no completion; this is a
//! maintenance surface, not an editor.

use core::fmt::Write;

use crate::buffer::LineBuffer;
use crate::comm::CommPort;
use crate::fault::{FaultCode, FaultLog};
use crate::hal::Uart;
use crate::scheduler::TaskScheduler;

/// Parsed command line: name plus up to three whitespace-split
/// arguments.
#[derive(Debug, Clone)]
pub struct ParsedCommand<'a> {
    pub command: &'a str,
    pub args: [Option<&'a str>; 3],
}

impl<'a> ParsedCommand<'a> {
    pub fn arg(&self, idx: usize) -> Option<&'a str> {
        self.args.get(idx).copied().flatten()
    }
}

pub fn parse_line(line: &str) -> ParsedCommand<'_> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or("");

    let mut args = [None, None, None];
    for (i, arg) in parts.take(3).enumerate() {
        args[i] = Some(arg);
    }

    ParsedCommand { command, args }
}

/// Read-only system snapshot handed to command handlers.
pub struct ShellStatus<'a> {
    pub version: &'a str,
    pub uptime_ms: u32,
    pub scheduler: &'a TaskScheduler,
}

pub struct CommandDescriptor {
    pub name: &'static str,
    pub brief: &'static str,
    pub handler:
        fn(&ParsedCommand<'_>, &ShellStatus<'_>, &FaultLog, &mut dyn Write) -> Result<(), FaultCode>,
}

pub static COMMANDS: &[CommandDescriptor] = &[
    CommandDescriptor { name: "help", brief: "List commands", handler: cmd_help },
    CommandDescriptor { name: "version", brief: "Firmware version", handler: cmd_version },
    CommandDescriptor { name: "status", brief: "System status", handler: cmd_status },
    CommandDescriptor { name: "tasks", brief: "Scheduled tasks", handler: cmd_tasks },
];

/// Dispatch a parsed line. Empty lines are silently accepted.
pub fn execute(
    cmd: &ParsedCommand<'_>,
    status: &ShellStatus<'_>,
    faults: &FaultLog,
    out: &mut dyn Write,
) -> Result<(), FaultCode> {
    if cmd.command.is_empty() {
        return Ok(());
    }

    let descriptor = COMMANDS
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(cmd.command))
        .ok_or(FaultCode::UnknownCommand)?;

    (descriptor.handler)(cmd, status, faults, out)
}

fn cmd_help(
    _cmd: &ParsedCommand<'_>,
    _status: &ShellStatus<'_>,
    _faults: &FaultLog,
    out: &mut dyn Write,
) -> Result<(), FaultCode> {
    for c in COMMANDS {
        let _ = writeln!(out, "  {:<10} {}", c.name, c.brief);
    }
    Ok(())
}

fn cmd_version(
    _cmd: &ParsedCommand<'_>,
    status: &ShellStatus<'_>,
    _faults: &FaultLog,
    out: &mut dyn Write,
) -> Result<(), FaultCode> {
    let _ = writeln!(out, "{}", status.version);
    Ok(())
}

fn cmd_status(
    _cmd: &ParsedCommand<'_>,
    status: &ShellStatus<'_>,
    faults: &FaultLog,
    out: &mut dyn Write,
) -> Result<(), FaultCode> {
    let _ = writeln!(out, "uptime: {} ms", status.uptime_ms);
    let _ = writeln!(out, "tasks: {}", status.scheduler.len());
    let _ = writeln!(out, "faults: {}", faults.total());
    if let Some(rec) = faults.last_warning() {
        let _ = writeln!(out, "last warning: {} @ {}", rec.code.as_str(), rec.tick);
    }
    if let Some(rec) = faults.last_error() {
        let _ = writeln!(out, "last error: {} @ {}", rec.code.as_str(), rec.tick);
    }
    Ok(())
}

fn cmd_tasks(
    _cmd: &ParsedCommand<'_>,
    status: &ShellStatus<'_>,
    _faults: &FaultLog,
    out: &mut dyn Write,
) -> Result<(), FaultCode> {
    for (id, task) in status.scheduler.tasks() {
        let _ = writeln!(
            out,
            "  {:>2}: busy={} runs={} last_run={}",
            id,
            task.is_busy(),
            task.runs_remaining(),
            task.last_run()
        );
    }
    Ok(())
}

/// `core::fmt::Write` sink over a port's TX path. `'\n'` expands to the
/// port's configured TX newline.
pub struct PortWrite<'w, 'a, U: Uart, const TX: usize, const RX: usize, const LINE: usize, const QD: usize>
{
    pub port: &'w CommPort<'a, TX, RX, LINE, QD>,
    pub uart: &'w mut U,
}

impl<U: Uart, const TX: usize, const RX: usize, const LINE: usize, const QD: usize> Write
    for PortWrite<'_, '_, U, TX, RX, LINE, QD>
{
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for b in s.as_bytes() {
            if *b == b'\n' {
                self.port
                    .put_bytes(self.uart, self.port.config().tx_newline.pattern());
            } else {
                self.port.put_char(self.uart, *b);
            }
        }
        Ok(())
    }
}

/// The shell itself: one scratch line plus a dispatch counter.
pub struct Shell<const M: usize> {
    line: LineBuffer<M>,
    commands_run: u32,
}

impl<const M: usize> Shell<M> {
    pub const fn new() -> Self {
        Self {
            line: LineBuffer::new(),
            commands_run: 0,
        }
    }

    pub fn commands_run(&self) -> u32 {
        self.commands_run
    }

    /// Write the prompt. Called once at startup and after each line.
    pub fn prompt<U, const TX: usize, const RX: usize, const LINE: usize, const QD: usize>(
        &self,
        port: &CommPort<'_, TX, RX, LINE, QD>,
        uart: &mut U,
    ) where
        U: Uart,
    {
        port.put_str(uart, "> ");
    }

    /// One shell pass: consume a completed line from the port, dispatch
    /// it, reply, re-prompt. Returns `true` when a line was handled.
    ///
    /// Escape sequences are consumed and discarded (no line editing on
    /// this surface).
    pub fn process<U, const TX: usize, const RX: usize, const LINE: usize, const QD: usize>(
        &mut self,
        port: &mut CommPort<'_, TX, RX, LINE, QD>,
        uart: &mut U,
        status: &ShellStatus<'_>,
        faults: &mut FaultLog,
        now: u32,
    ) -> bool
    where
        U: Uart,
    {
        if port.sequence_complete() {
            port.reset_sequence();
        }
        if !port.take_line(&mut self.line) {
            return false;
        }

        let text = core::str::from_utf8(self.line.effective()).unwrap_or("");
        let parsed = parse_line(text);
        let dispatched = !parsed.command.is_empty();

        let mut out = PortWrite {
            port,
            uart: &mut *uart,
        };
        let result = execute(&parsed, status, faults, &mut out);
        if let Err(code) = result {
            faults.report1(code, 0, now);
            let _ = writeln!(out, "error: {}", code.as_str());
        }

        if dispatched {
            self.commands_run = self.commands_run.wrapping_add(1);
        }
        self.prompt(port, uart);
        true
    }
}

impl<const M: usize> Default for Shell<M> {
    fn default() -> Self {
        Self::new()
    }
}
