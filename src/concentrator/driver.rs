//! SX1308 SPI driver
//!
//! Register access only: the register map and radio configuration live in the
//! host HAL, the board just moves bytes. Chip-select is driven manually so a
//! burst can span several request frames.
//!
//! SPI framing is one address byte (bit 7 set for a write) followed by data.

use crate::concentrator::traits::{Concentrator, ConcentratorError};
use crate::config::protocol::DEFAULT_UNIQUE_ID;
use crate::protocol::chunking::ChunkRole;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

const WRITE_ACCESS: u8 = 0x80;
const ADDRESS_MASK: u8 = 0x7F;

/// Reset pulse width
const RESET_PULSE_US: u32 = 100;

/// Control pins for SX1308
pub struct Sx1308Pins<Nss, Rst> {
    pub nss: Nss,
    pub reset: Rst,
}

/// SX1308 concentrator driver
///
/// Every SPI transaction runs inside a critical section so the TX-done
/// interrupt cannot land between chip-select edges.
pub struct Sx1308<Spi, Nss, Rst, Delay>
where
    Spi: SpiBus,
    Nss: OutputPin,
    Rst: OutputPin,
    Delay: DelayNs,
{
    spi: Spi,
    nss: Nss,
    reset: Rst,
    delay: Delay,
    unique_id: [u8; 8],
}

impl<Spi, Nss, Rst, Delay> Sx1308<Spi, Nss, Rst, Delay>
where
    Spi: SpiBus,
    Nss: OutputPin,
    Rst: OutputPin,
    Delay: DelayNs,
{
    /// Create a new SX1308 driver with chip-select released
    pub fn new(spi: Spi, pins: Sx1308Pins<Nss, Rst>, delay: Delay) -> Self {
        let mut driver = Self {
            spi,
            nss: pins.nss,
            reset: pins.reset,
            delay,
            unique_id: DEFAULT_UNIQUE_ID,
        };
        let _ = driver.nss.set_high();
        let _ = driver.reset.set_low();
        driver
    }

    /// Report `unique_id` to the firmware check instead of the default
    pub fn with_unique_id(mut self, unique_id: [u8; 8]) -> Self {
        self.unique_id = unique_id;
        self
    }

    /// Pulse the reset line (active high), releasing any open burst first
    pub fn hard_reset(&mut self) -> Result<(), ConcentratorError> {
        self.nss.set_high().map_err(|_| ConcentratorError::Pin)?;
        self.reset.set_high().map_err(|_| ConcentratorError::Pin)?;
        self.delay.delay_us(RESET_PULSE_US);
        self.reset.set_low().map_err(|_| ConcentratorError::Pin)?;
        self.delay.delay_us(RESET_PULSE_US);
        Ok(())
    }

    fn select(&mut self) -> Result<(), ConcentratorError> {
        self.nss.set_low().map_err(|_| ConcentratorError::Pin)
    }

    fn deselect(&mut self) -> Result<(), ConcentratorError> {
        self.spi.flush().map_err(|_| ConcentratorError::Spi)?;
        self.nss.set_high().map_err(|_| ConcentratorError::Pin)
    }

    /// Run one chunk of a transaction, handling chip-select for `role`
    fn transaction<F>(&mut self, role: ChunkRole, command: u8, body: F) -> Result<(), ConcentratorError>
    where
        F: FnOnce(&mut Spi) -> Result<(), Spi::Error>,
    {
        let closes = matches!(role, ChunkRole::Atomic | ChunkRole::End);

        critical_section::with(|_| match self.transfer(role, command, body) {
            Ok(()) if closes => self.deselect(),
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = self.deselect();
                Err(e)
            }
        })
    }

    fn transfer<F>(&mut self, role: ChunkRole, command: u8, body: F) -> Result<(), ConcentratorError>
    where
        F: FnOnce(&mut Spi) -> Result<(), Spi::Error>,
    {
        if matches!(role, ChunkRole::Atomic | ChunkRole::First) {
            self.select()?;
            self.spi.write(&[command]).map_err(|_| ConcentratorError::Spi)?;
        }
        body(&mut self.spi).map_err(|_| ConcentratorError::Spi)
    }
}

impl<Spi, Nss, Rst, Delay> Concentrator for Sx1308<Spi, Nss, Rst, Delay>
where
    Spi: SpiBus,
    Nss: OutputPin,
    Rst: OutputPin,
    Delay: DelayNs,
{
    fn spi_read(&mut self, address: u8) -> Result<u8, ConcentratorError> {
        let mut value = [0u8; 1];
        self.transaction(ChunkRole::Atomic, address & ADDRESS_MASK, |spi| spi.read(&mut value))?;
        Ok(value[0])
    }

    fn spi_write(&mut self, address: u8, value: u8) -> Result<(), ConcentratorError> {
        self.transaction(ChunkRole::Atomic, WRITE_ACCESS | (address & ADDRESS_MASK), |spi| {
            spi.write(&[value])
        })
    }

    fn read_burst(&mut self, role: ChunkRole, address: u8, buf: &mut [u8]) -> Result<(), ConcentratorError> {
        self.transaction(role, address & ADDRESS_MASK, |spi| spi.read(buf))
    }

    fn write_burst(&mut self, role: ChunkRole, address: u8, data: &[u8]) -> Result<(), ConcentratorError> {
        self.transaction(role, WRITE_ACCESS | (address & ADDRESS_MASK), |spi| spi.write(data))
    }

    fn unique_id(&self) -> [u8; 8] {
        self.unique_id
    }

    fn soft_reset(&mut self) -> Result<(), ConcentratorError> {
        self.hard_reset()
    }

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }
}
