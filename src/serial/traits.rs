//! Serial port trait for abstraction and testability
//!
//! The device decoder reads requests and writes answers through this trait,
//! so the UART driver can be swapped with a mock for testing.

use core::future::Future;

/// Errors that can occur during serial operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    /// Framing or parity error reported by the UART
    FramingError,
    /// Receive FIFO overrun or transmit buffer full
    OverflowError,
    /// Write error
    WriteError,
}

/// Abstract serial port interface for testability
///
/// The port is a plain byte pipe: no delimiters, no flow control.
pub trait SerialPort {
    /// Read bytes into buffer
    ///
    /// Returns the number of bytes actually read. May return fewer bytes
    /// than the buffer size, or zero when nothing is pending.
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, SerialError>>;

    /// Write bytes from buffer
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<(), SerialError>>;

    /// Flush the write buffer
    fn flush(&mut self) -> impl Future<Output = Result<(), SerialError>>;
}

#[cfg(test)]
pub mod mock {
    //! Mock serial port for testing

    use super::*;
    use core::cell::RefCell;
    use heapless::Vec;

    const MOCK_BUFFER_SIZE: usize = 8192;

    /// Mock serial port for unit testing
    pub struct MockSerialPort {
        /// Data queued to be returned by read()
        rx_buffer: RefCell<Vec<u8, MOCK_BUFFER_SIZE>>,
        /// Data written via write()
        tx_buffer: RefCell<Vec<u8, MOCK_BUFFER_SIZE>>,
        /// Error to return on next read
        next_read_error: RefCell<Option<SerialError>>,
        /// Error to return on next write
        next_write_error: RefCell<Option<SerialError>>,
    }

    impl MockSerialPort {
        /// Create a new mock serial port
        pub fn new() -> Self {
            Self {
                rx_buffer: RefCell::new(Vec::new()),
                tx_buffer: RefCell::new(Vec::new()),
                next_read_error: RefCell::new(None),
                next_write_error: RefCell::new(None),
            }
        }

        /// Queue data to be returned by read()
        pub fn queue_rx_data(&self, data: &[u8]) {
            let _ = self.rx_buffer.borrow_mut().extend_from_slice(data);
        }

        /// Get all data written via write()
        pub fn get_tx_data(&self) -> Vec<u8, MOCK_BUFFER_SIZE> {
            self.tx_buffer.borrow().clone()
        }

        /// Take and clear everything written so far
        pub fn take_tx_data(&self) -> Vec<u8, MOCK_BUFFER_SIZE> {
            core::mem::take(&mut *self.tx_buffer.borrow_mut())
        }

        /// Bytes queued but not yet read
        pub fn pending_rx(&self) -> usize {
            self.rx_buffer.borrow().len()
        }

        /// Set an error to be returned by the next read() call
        pub fn set_next_read_error(&self, error: SerialError) {
            *self.next_read_error.borrow_mut() = Some(error);
        }

        /// Set an error to be returned by the next write() call
        pub fn set_next_write_error(&self, error: SerialError) {
            *self.next_write_error.borrow_mut() = Some(error);
        }
    }

    impl Default for MockSerialPort {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SerialPort for MockSerialPort {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
            if let Some(error) = self.next_read_error.borrow_mut().take() {
                return Err(error);
            }

            let mut rx = self.rx_buffer.borrow_mut();
            if rx.is_empty() {
                return Ok(0);
            }

            // Read up to buf.len() bytes
            let count = core::cmp::min(buf.len(), rx.len());
            buf[..count].copy_from_slice(&rx[..count]);

            let remaining: Vec<u8, MOCK_BUFFER_SIZE> = rx[count..].iter().copied().collect();
            *rx = remaining;

            Ok(count)
        }

        async fn write(&mut self, data: &[u8]) -> Result<(), SerialError> {
            if let Some(error) = self.next_write_error.borrow_mut().take() {
                return Err(error);
            }

            self.tx_buffer
                .borrow_mut()
                .extend_from_slice(data)
                .map_err(|_| SerialError::OverflowError)?;

            Ok(())
        }

        async fn flush(&mut self) -> Result<(), SerialError> {
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_mock_partial_read() {
            let mut port = MockSerialPort::new();

            futures::executor::block_on(async {
                port.queue_rx_data(b"r\x00\x01\x55\x00");

                let mut header = [0u8; 4];
                assert_eq!(port.read(&mut header).await.unwrap(), 4);
                assert_eq!(&header, b"r\x00\x01\x55");
                assert_eq!(port.pending_rx(), 1);

                let mut rest = [0u8; 16];
                assert_eq!(port.read(&mut rest).await.unwrap(), 1);
                assert_eq!(port.read(&mut rest).await.unwrap(), 0);
            });
        }

        #[test]
        fn test_mock_take_tx_data() {
            let mut port = MockSerialPort::new();

            futures::executor::block_on(async {
                port.write(&[b'r', 0, 1]).await.unwrap();
                port.write(&[0x01, 0x96]).await.unwrap();

                assert_eq!(port.take_tx_data().as_slice(), &[b'r', 0, 1, 0x01, 0x96]);
                assert!(port.get_tx_data().is_empty());
            });
        }

        #[test]
        fn test_mock_errors_are_one_shot() {
            let mut port = MockSerialPort::new();

            futures::executor::block_on(async {
                port.set_next_read_error(SerialError::FramingError);
                port.set_next_write_error(SerialError::WriteError);

                let mut buf = [0u8; 8];
                assert_eq!(port.read(&mut buf).await, Err(SerialError::FramingError));
                assert_eq!(port.write(&[1]).await, Err(SerialError::WriteError));

                port.queue_rx_data(&[0x42]);
                assert_eq!(port.read(&mut buf).await, Ok(1));
                assert_eq!(port.write(&[1]).await, Ok(()));
            });
        }
    }
}
