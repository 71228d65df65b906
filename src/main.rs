#![no_std]
#![no_main]

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::delay::Delay;
use esp_hal::gpio::{Event, Input, InputConfig, Io, Level, Output, OutputConfig, Pull};
use esp_hal::handler;
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::spi::Mode as SpiMode;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::{Config as UartConfig, Uart, UartRx, UartTx};
use esp_hal::{Async, Blocking};
use static_cell::StaticCell;

use lgw_bridge::concentrator::{Sx1308, Sx1308Pins};
use lgw_bridge::config;
use lgw_bridge::dispatcher::{DeviceBridge, DispatcherConfig, Served, TxDoneFlag};
use lgw_bridge::protocol::WireEncoding;
use lgw_bridge::serial::SerialIo;

type Board = Sx1308<Spi<'static, Blocking>, Output<'static>, Output<'static>, Delay>;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

/// Raised by the TX-done interrupt, consumed by the decoder
///
/// `Sx1308` only carries register traffic and answers `f` with KO. A board
/// driver with a radio HAL must implement `Concentrator::send` for TX. Its
/// TX-done wait blocks this executor, which runs only the bridge task.
static TX_DONE: TxDoneFlag = TxDoneFlag::new();

/// TX-done input, shared with the GPIO interrupt handler
static TX_DONE_PIN: Mutex<CriticalSectionRawMutex, RefCell<Option<Input<'static>>>> = Mutex::new(RefCell::new(None));

#[handler]
fn gpio_handler() {
    TX_DONE_PIN.lock(|cell| {
        if let Some(pin) = cell.borrow_mut().as_mut() {
            if pin.is_interrupt_set() {
                pin.clear_interrupt();
                TX_DONE.notify();
            }
        }
    });
}

#[esp_hal::main]
fn main() -> ! {
    // Logs go to the JTAG console, the UART carries only bridge frames
    esp_println::logger::init_logger(log::LevelFilter::Info);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let mut io = Io::new(peripherals.IO_MUX);
    io.set_interrupt_handler(gpio_handler);

    // Blocking SPI: bursts run inside critical sections
    let spi = Spi::new(
        peripherals.SPI2,
        SpiConfig::default()
            .with_frequency(Rate::from_mhz(config::spi::FREQUENCY_MHZ))
            .with_mode(SpiMode::_0),
    )
    .unwrap()
    .with_sck(peripherals.GPIO12)
    .with_miso(peripherals.GPIO13)
    .with_mosi(peripherals.GPIO11);

    let pins = Sx1308Pins {
        nss: Output::new(peripherals.GPIO10, Level::High, OutputConfig::default()),
        reset: Output::new(peripherals.GPIO9, Level::Low, OutputConfig::default()),
    };

    // Report the eFuse MAC as unique id
    let mac = esp_hal::efuse::Efuse::read_base_mac_address();
    let unique_id = [0, 0, mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]];

    let mut concentrator = Sx1308::new(spi, pins, Delay::new()).with_unique_id(unique_id);
    if concentrator.hard_reset().is_err() {
        log::error!("concentrator reset failed");
    }

    let mut tx_done = Input::new(peripherals.GPIO14, InputConfig::default().with_pull(Pull::Down));
    tx_done.listen(Event::RisingEdge);
    TX_DONE_PIN.lock(|cell| cell.replace(Some(tx_done)));

    let uart = Uart::new(
        peripherals.UART1,
        UartConfig::default().with_baudrate(config::serial::BAUD_RATE),
    )
    .unwrap()
    .with_tx(peripherals.GPIO17)
    .with_rx(peripherals.GPIO18)
    .into_async();
    let (uart_rx, uart_tx) = uart.split();

    log::info!(
        "bridge firmware {:#010x} ready, {} baud",
        config::protocol::FIRMWARE_VERSION,
        config::serial::BAUD_RATE
    );

    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(bridge_task(uart_rx, uart_tx, concentrator));
    })
}

/// Task that serves host requests, one at a time
#[embassy_executor::task]
async fn bridge_task(uart_rx: UartRx<'static, Async>, uart_tx: UartTx<'static, Async>, concentrator: Board) {
    let serial = SerialIo::new(uart_rx, uart_tx);
    let mut bridge = DeviceBridge::new(
        serial,
        concentrator,
        WireEncoding::Binary,
        DispatcherConfig::default(),
        &TX_DONE,
    );

    loop {
        match bridge.serve_once().await {
            Ok(Served::Idle) => Timer::after(Duration::from_millis(1)).await,
            Ok(_) => {}
            Err(e) => {
                // UART error, drop the partial frame and carry on
                log::warn!("serial error: {:?}", e);
                Timer::after(Duration::from_millis(10)).await;
            }
        }
    }
}
