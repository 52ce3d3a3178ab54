//! SmartRelayModule - esp32 entry point
//!
//! Static construction of the firmware context, UART interrupt glue and
//! the cooperative main loop:
//! drain RX → port updates → SRAM engine service (by whoever owns the
//! in-flight operation) → scheduler step → fault render.
//!
//! Two links: the terminal port feeds the shell directly; the server
//! port buffers its completed lines through external SRAM.

#![no_std]
#![no_main]

use esp_idf_svc::sys as esp_idf_sys;

use smart_relay_module::{
    comm::{CommChannel, CommConfig, CommPort},
    fault::FaultLog,
    hal::{Millis, SramDma, Uart},
    scheduler::{TaskScheduler, TaskSpec},
    shell::{Shell, ShellStatus},
    sram::{SramConfig, SramEngine, SramMode},
};

/// Ring sizes per link (bytes).
const TERM_TX: usize = 256;
const TERM_RX: usize = 256;
const SRV_TX: usize = 64;
const SRV_RX: usize = 512;
/// Line buffer and external block geometry.
const LINE_CAPACITY: usize = 128;
const BLOCK_COUNT: usize = 8;

/// git-stamped version from build.rs.
const VERSION: &str = env!("VERSION_STRING");

// The interrupt handlers and the main loop share only these.
static TERMINAL_CHANNEL: CommChannel<TERM_TX, TERM_RX> = CommChannel::new();
static SERVER_CHANNEL: CommChannel<SRV_TX, SRV_RX> = CommChannel::new();

/// UART1 RX interrupt body: one byte from the receive register into the
/// terminal ring.
#[no_mangle]
extern "C" fn uart1_rx_isr() {
    let _ = TERMINAL_CHANNEL.isr_rx_byte(read_rx_register(1));
}

/// UART1 TX-ready interrupt body: next ring byte into the transmit
/// register, or disable the interrupt when drained/paused.
#[no_mangle]
extern "C" fn uart1_tx_isr() {
    match TERMINAL_CHANNEL.isr_tx_pop() {
        Some(byte) => write_tx_register(1, byte),
        None => set_tx_interrupt(1, false),
    }
}

#[no_mangle]
extern "C" fn uart2_rx_isr() {
    let _ = SERVER_CHANNEL.isr_rx_byte(read_rx_register(2));
}

#[no_mangle]
extern "C" fn uart2_tx_isr() {
    match SERVER_CHANNEL.isr_tx_pop() {
        Some(byte) => write_tx_register(2, byte),
        None => set_tx_interrupt(2, false),
    }
}

/// Register access for one UART.
struct PortUart {
    index: u8,
}

impl Uart for PortUart {
    fn write_direct(&mut self, byte: u8) {
        // Blocking single-byte write, ahead of the ring (XON/XOFF path).
        write_tx_register(self.index, byte);
    }

    fn set_tx_interrupt(&mut self, enabled: bool) {
        set_tx_interrupt(self.index, enabled);
    }
}

/// SPI DMA channel wired to the external 23LC1024-class SRAM.
struct SpiSramDma;

impl SramDma for SpiSramDma {
    fn begin_command(&mut self, packet: &[u8]) {
        spi_dma_start(packet.as_ptr(), core::ptr::null_mut(), packet.len());
    }

    fn begin_read(&mut self, address: u32, dest: &mut [u8]) {
        let _ = address; // device address was latched by the init packet
        spi_dma_start(core::ptr::null(), dest.as_mut_ptr(), dest.len());
    }

    fn begin_write(&mut self, address: u32, src: &[u8]) {
        let _ = address;
        spi_dma_start(src.as_ptr(), core::ptr::null_mut(), src.len());
    }

    fn begin_fill(&mut self, address: u32, value: u8, len: usize) {
        let _ = address;
        spi_dma_fill(value, len);
    }

    fn is_busy(&self) -> bool {
        spi_dma_busy()
    }
}

struct EspMillis;

impl Millis for EspMillis {
    fn now(&self) -> u32 {
        (unsafe { esp_idf_sys::esp_timer_get_time() } / 1000) as u32
    }
}

/// Heartbeat task: params[0] counts beats.
fn heartbeat(params: &mut [u32; 4]) -> bool {
    params[0] = params[0].wrapping_add(1);
    true
}

#[no_mangle]
fn main() {
    esp_idf_sys::link_patches();

    let clock = EspMillis;
    let mut term_uart = PortUart { index: 1 };
    let mut srv_uart = PortUart { index: 2 };
    let mut dma = SpiSramDma;

    let mut engine = SramEngine::new(SramConfig::default());
    let mut faults = FaultLog::new();
    let mut scheduler = TaskScheduler::new();
    let mut shell: Shell<LINE_CAPACITY> = Shell::new();

    // Shell consumes the terminal's lines directly.
    let mut terminal: CommPort<'_, TERM_TX, TERM_RX, LINE_CAPACITY, BLOCK_COUNT> =
        CommPort::new(&TERMINAL_CHANNEL, CommConfig::default());
    terminal.config_mut().echo_rx = true;
    terminal.config_mut().echo_newline = true;

    // Server lines overflow into the external SRAM block ring.
    let mut server: CommPort<'_, SRV_TX, SRV_RX, LINE_CAPACITY, BLOCK_COUNT> =
        CommPort::new(&SERVER_CHANNEL, CommConfig::default())
            .with_external_storage(0, LINE_CAPACITY as u32);

    // Device into burst mode before anything queues behind the engine.
    let _ = engine.set_mode(&mut dma, SramMode::Burst, clock.now());

    let mut spec = TaskSpec::new(heartbeat);
    spec.periodic = true;
    spec.infinite = true;
    spec.interval = 1000;
    let _ = scheduler.add_task(&spec, clock.now());

    shell.prompt(&terminal, &mut term_uart);

    loop {
        let now = clock.now();

        terminal.update(&mut term_uart, &mut engine, &mut dma, &mut faults, now);
        server.update(&mut srv_uart, &mut engine, &mut dma, &mut faults, now);

        let status = ShellStatus {
            version: VERSION,
            uptime_ms: now,
            scheduler: &scheduler,
        };
        shell.process(&mut terminal, &mut term_uart, &status, &mut faults, now);

        scheduler.step(&mut faults, now);

        // Render pass: one drain per loop iteration.
        while let Some(rec) = faults.drain() {
            terminal.put_str(&mut term_uart, "! ");
            terminal.put_line(&mut term_uart, rec.code.as_str());
        }

        unsafe {
            esp_idf_sys::vTaskDelay(1);
        }
    }
}

// --- Register access shims (wired to the target UART/SPI in sdkconfig) ---

fn read_rx_register(_uart: u8) -> u8 {
    // TODO: read the UART FIFO via esp_idf_sys once the board rev is final
    0
}

fn write_tx_register(_uart: u8, _byte: u8) {
    // TODO: UART FIFO write
}

fn set_tx_interrupt(_uart: u8, _enabled: bool) {
    // TODO: uart_enable_tx_intr / uart_disable_tx_intr
}

fn spi_dma_start(_tx: *const u8, _rx: *mut u8, _len: usize) {
    // TODO: spi_device_queue_trans against the SRAM device handle
}

fn spi_dma_fill(_value: u8, _len: usize) {
    // TODO: repeated-source DMA descriptor
}

fn spi_dma_busy() -> bool {
    // TODO: spi_device_get_trans_result poll
    false
}
