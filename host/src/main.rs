//! Command-line access to a concentrator behind the bridge firmware.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;

use lgw_bridge::config::serial::BAUD_RATE;
use lgw_bridge::protocol::WireEncoding;
use lgw_host::logging::{init_logging, LogLevel};
use lgw_host::selftest::{print_results, run_all_tests};
use lgw_host::{transport, BridgeConfig};

#[derive(Parser)]
#[command(name = "lgw-bridge")]
#[command(about = "Talk to a LoRa concentrator through the bridge firmware")]
struct Args {
    /// Serial port for the bridge (use "auto" to probe /dev/ttyACM0-9)
    #[arg(short, long, default_value = "auto", global = true)]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value_t = BAUD_RATE, global = true)]
    baud: u32,

    /// Log level
    #[arg(long, value_enum, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Send requests hex-encoded, for early firmware
    #[arg(long, global = true)]
    ascii: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find the bridge and check its firmware
    Probe,
    /// Read one register
    Read {
        #[arg(value_parser = parse_u8)]
        address: u8,
    },
    /// Write one register
    Write {
        #[arg(value_parser = parse_u8)]
        address: u8,
        #[arg(value_parser = parse_u8)]
        value: u8,
    },
    /// Read a burst and print it as hex
    Dump {
        #[arg(value_parser = parse_u8)]
        address: u8,
        len: usize,
    },
    /// Write a burst of one repeated byte
    Fill {
        #[arg(value_parser = parse_u8)]
        address: u8,
        len: usize,
        #[arg(value_parser = parse_u8)]
        value: u8,
    },
    /// Read the trigger counter
    Trigcnt,
    /// Reset the concentrator
    Reset,
    /// Jump to the board bootloader
    Dfu,
    /// Run the link self-test
    Selftest,
}

/// Accept decimal or 0x-prefixed hex
fn parse_u8(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("{}: {}", s, e))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_level);

    let config = BridgeConfig {
        encoding: if args.ascii {
            WireEncoding::AsciiHex
        } else {
            WireEncoding::Binary
        },
        ..BridgeConfig::default()
    };
    let (path, session) =
        transport::connect(&args.port, args.baud, config).context("cannot open the bridge")?;
    tracing::info!("using {} at {} baud", path, args.baud);

    match args.command {
        Command::Probe => {
            let id = session.unique_id()?;
            println!("{} {}", "Bridge found on".green(), path);
            println!("Unique id: {}", hex(&id));
        }
        Command::Read { address } => {
            let value = session.read_register(address)?;
            println!("{:#04x}: {:#04x}", address, value);
        }
        Command::Write { address, value } => {
            session.write_register(address, value)?;
        }
        Command::Dump { address, len } => {
            let mut data = vec![0u8; len];
            session.read_burst(address, &mut data)?;
            for (i, line) in data.chunks(16).enumerate() {
                println!("{:06x}  {}", i * 16, hex(line));
            }
        }
        Command::Fill { address, len, value } => {
            session.write_burst(address, &vec![value; len])?;
        }
        Command::Trigcnt => {
            println!("{}", session.trigger_count()?);
        }
        Command::Reset => {
            session.reset()?;
            println!("{}", "Concentrator reset".green());
        }
        Command::Dfu => {
            session.enter_bootloader()?;
            println!("{}", "Bootloader requested".green());
        }
        Command::Selftest => {
            println!("{}", "Bridge Link Self-Test".bold());
            println!("Port: {}", path);
            println!();

            let results = run_all_tests(&session);
            print_results(&results);

            // Exit with error code if any tests failed
            if results.iter().any(|r| !r.passed) {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ")
}
