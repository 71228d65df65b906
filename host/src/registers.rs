//! Register access over the bridge.
//!
//! Single registers are one request each. Bursts are cut into chunks by
//! [`ChunkPlan`]; all chunks of one burst go out under a single lock so no
//! other caller can slip a request into the open SPI transaction.

use lgw_bridge::protocol::{ChunkPlan, CommandTag, Direction};

use crate::error::{BridgeError, Result};
use crate::session::BridgeSession;
use crate::transport::Transport;

impl<T: Transport> BridgeSession<T> {
    /// Write one concentrator register
    pub fn write_register(&self, address: u8, value: u8) -> Result<()> {
        self.lock()?.post(CommandTag::WriteRegister, address, &[value])
    }

    /// Read one concentrator register
    pub fn read_register(&self, address: u8) -> Result<u8> {
        let answer = self.command(CommandTag::ReadRegister, address, &[0])?.ensure_ok()?;
        match answer.data.as_slice() {
            [value] => Ok(*value),
            other => Err(BridgeError::LengthMismatch {
                expected: 1,
                got: other.len(),
            }),
        }
    }

    /// Write `data` starting at `address`, chunked as needed
    pub fn write_burst(&self, address: u8, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let plan = ChunkPlan::new(data.len(), self.config().write_chunk);
        log::debug!("write burst {:#04x}: {} bytes in {} chunks", address, data.len(), plan.chunk_count());

        let mut link = self.lock()?;
        for chunk in plan {
            let tag = CommandTag::burst(Direction::Write, chunk.role);
            link.post(tag, address, &data[chunk.range()])?;
        }
        Ok(())
    }

    /// Fill `data` from `address`, chunked as needed
    pub fn read_burst(&self, address: u8, data: &mut [u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let plan = ChunkPlan::new(data.len(), self.config().read_chunk);
        log::debug!("read burst {:#04x}: {} bytes in {} chunks", address, data.len(), plan.chunk_count());

        let mut link = self.lock()?;
        for chunk in plan {
            let tag = CommandTag::burst(Direction::Read, chunk.role);
            let size = (chunk.len as u16).to_be_bytes();
            let answer = link.transact(tag, address, &size)?.ensure_ok()?;
            if answer.data.len() != chunk.len {
                return Err(BridgeError::LengthMismatch {
                    expected: chunk.len,
                    got: answer.data.len(),
                });
            }
            data[chunk.range()].copy_from_slice(&answer.data);
        }
        Ok(())
    }
}
