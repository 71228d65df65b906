//! [`SerialPort`] over embedded_io_async halves.
//!
//! Lets the bridge run on any split UART (or other byte pipe) exposing
//! `embedded_io_async::{Read, Write}`.

use crate::serial::traits::{SerialError, SerialPort};
use embedded_io::{Error, ErrorKind};
use embedded_io_async::{Read, Write};

/// Serial port built from a reader and a writer half.
pub struct SerialIo<R, W> {
    rx: R,
    tx: W,
}

impl<R: Read, W: Write> SerialIo<R, W> {
    pub fn new(rx: R, tx: W) -> Self {
        Self { rx, tx }
    }
}

fn map_error<E: Error>(error: E, fallback: SerialError) -> SerialError {
    match error.kind() {
        ErrorKind::InvalidData => SerialError::FramingError,
        ErrorKind::OutOfMemory => SerialError::OverflowError,
        _ => fallback,
    }
}

impl<R: Read, W: Write> SerialPort for SerialIo<R, W> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        self.rx
            .read(buf)
            .await
            .map_err(|e| map_error(e, SerialError::FramingError))
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), SerialError> {
        self.tx
            .write_all(data)
            .await
            .map_err(|e| map_error(e, SerialError::WriteError))
    }

    async fn flush(&mut self) -> Result<(), SerialError> {
        self.tx
            .flush()
            .await
            .map_err(|e| map_error(e, SerialError::WriteError))
    }
}
