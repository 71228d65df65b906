//! Concentrator trait for abstraction and testability
//!
//! The decoder drives the concentrator through this trait so the SX1308 SPI
//! driver can be swapped with a mock for testing. Register primitives are
//! required; gateway-level operations default to [`ConcentratorError::Unsupported`]
//! so a board without a radio HAL still answers every command.

use crate::config::protocol::DEFAULT_UNIQUE_ID;
use crate::protocol::chunking::ChunkRole;

/// Errors that can occur during concentrator operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcentratorError {
    /// SPI bus error
    Spi,
    /// Chip-select or reset pin error
    Pin,
    /// Operation not provided by this concentrator
    Unsupported,
    /// Configuration rejected
    InvalidConfig,
    /// HAL operation failed
    Failed,
}

/// Transmit mode reported after a send is started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// Packet scheduled; completion is signalled by the TX-done interrupt
    Scheduled,
    /// Continuous test transmission; it never completes
    Continuous,
}

/// Abstract concentrator interface
///
/// Burst primitives map chunk roles onto chip-select handling:
/// `First` selects and sends the address byte, `Middle` only clocks data,
/// `End` releases the bus, `Atomic` does all of it in one call.
pub trait Concentrator {
    /// Read a single register
    fn spi_read(&mut self, address: u8) -> Result<u8, ConcentratorError>;

    /// Write a single register
    fn spi_write(&mut self, address: u8, value: u8) -> Result<(), ConcentratorError>;

    /// Read one chunk of a register burst into `buf`
    fn read_burst(&mut self, role: ChunkRole, address: u8, buf: &mut [u8]) -> Result<(), ConcentratorError>;

    /// Write one chunk of a register burst
    fn write_burst(&mut self, role: ChunkRole, address: u8, data: &[u8]) -> Result<(), ConcentratorError>;

    /// Fetch up to `max_packets` received packets packed into `out`
    ///
    /// Returns the packet count and the number of bytes written.
    fn receive(&mut self, _max_packets: u8, _out: &mut [u8]) -> Result<(u8, usize), ConcentratorError> {
        Err(ConcentratorError::Unsupported)
    }

    fn rxrf_setconf(&mut self, _rf_chain: u8, _conf: &[u8]) -> Result<(), ConcentratorError> {
        Err(ConcentratorError::Unsupported)
    }

    fn rxif_setconf(&mut self, _if_chain: u8, _conf: &[u8]) -> Result<(), ConcentratorError> {
        Err(ConcentratorError::Unsupported)
    }

    fn txgain_setconf(&mut self, _lut: &[u8]) -> Result<(), ConcentratorError> {
        Err(ConcentratorError::Unsupported)
    }

    fn board_setconf(&mut self, _conf: &[u8]) -> Result<(), ConcentratorError> {
        Err(ConcentratorError::Unsupported)
    }

    /// Start transmitting a packed TX request
    fn send(&mut self, _packet: &[u8]) -> Result<TxMode, ConcentratorError> {
        Err(ConcentratorError::Unsupported)
    }

    /// Bring the concentrator back to receive after a scheduled transmission
    ///
    /// `completed` is false when the TX-done interrupt never arrived.
    fn finish_send(&mut self, _completed: bool) -> Result<(), ConcentratorError> {
        Ok(())
    }

    /// Internal counter value latched on the last trigger
    fn trigger_count(&mut self) -> Result<u32, ConcentratorError> {
        Err(ConcentratorError::Unsupported)
    }

    /// Transfer radio calibration offsets `idx_start..idx_start + idx_nb`
    fn calibration_transfer(&mut self, _idx_start: u8, _idx_nb: u8) -> Result<(), ConcentratorError> {
        Err(ConcentratorError::Unsupported)
    }

    /// Board unique id reported by the firmware check
    fn unique_id(&self) -> [u8; 8] {
        DEFAULT_UNIQUE_ID
    }

    fn soft_reset(&mut self) -> Result<(), ConcentratorError> {
        Err(ConcentratorError::Unsupported)
    }

    fn enter_bootloader(&mut self) -> Result<(), ConcentratorError> {
        Err(ConcentratorError::Unsupported)
    }

    /// Busy-wait used while polling for TX completion
    fn delay_us(&mut self, _us: u32) {}
}
