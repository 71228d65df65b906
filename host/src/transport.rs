//! Byte-stream transport to the bridge device.
//!
//! Anything that reads and writes bytes can carry the protocol through
//! [`Transport`]. On Linux the device shows up as a CDC-ACM node opened in
//! raw 8N1 mode.

use std::io::{self, ErrorKind, Read, Write};
use std::time::Duration;

use lgw_bridge::config::host::{DISCARD_READ_LIMIT, PROBE_PORT_COUNT, READ_TIMEOUT_MS};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::error::{BridgeError, Result};
use crate::session::{BridgeConfig, BridgeSession};

/// Byte pipe the session talks through
///
/// Reads may time out (`ErrorKind::TimedOut`) or return fewer bytes than
/// asked; the session treats both as an empty read.
pub trait Transport: Read + Write + Send {
    /// Drop input left over from a failed exchange, returning the bytes dropped
    fn discard_input(&mut self) -> io::Result<usize> {
        drain(self)
    }
}

impl Transport for Box<dyn SerialPort> {
    fn discard_input(&mut self) -> io::Result<usize> {
        self.clear(ClearBuffer::Input)?;
        // A late answer may still be on the wire
        drain(self)
    }
}

/// Read until the line goes quiet, at most [`DISCARD_READ_LIMIT`] reads
fn drain<R: Read + ?Sized>(reader: &mut R) -> io::Result<usize> {
    let mut buf = [0u8; 256];
    let mut dropped = 0;
    for _ in 0..DISCARD_READ_LIMIT {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => dropped += n,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(dropped)
}

/// Open a serial port in raw 8N1 mode without flow control
pub fn open_port(path: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(READ_TIMEOUT_MS))
        .open()?;

    // Drop whatever the device printed before we attached
    port.clear(serialport::ClearBuffer::All)?;
    Ok(port)
}

/// Device nodes tried by [`probe`], in order
pub fn candidate_paths() -> impl Iterator<Item = String> {
    (0..PROBE_PORT_COUNT).map(|i| format!("/dev/ttyACM{}", i))
}

/// Open the first CDC-ACM node that accepts the connection
pub fn probe(baud_rate: u32) -> Result<(String, Box<dyn SerialPort>)> {
    for path in candidate_paths() {
        match open_port(&path, baud_rate) {
            Ok(port) => {
                log::info!("bridge found on {}", path);
                return Ok((path, port));
            }
            Err(e) => log::debug!("{}: {}", path, e),
        }
    }
    Err(BridgeError::NoDevice)
}

/// Open `port`, or probe for one when it is "auto"
pub fn resolve(port: &str, baud_rate: u32) -> Result<(String, Box<dyn SerialPort>)> {
    if port == "auto" {
        probe(baud_rate)
    } else {
        Ok((port.to_string(), open_port(port, baud_rate)?))
    }
}

/// Open the bridge and check its firmware; a mismatch fails the open
pub fn connect(port: &str, baud_rate: u32, config: BridgeConfig) -> Result<(String, BridgeSession<Box<dyn SerialPort>>)> {
    let (path, port) = resolve(port, baud_rate)?;
    let session = BridgeSession::new(port, config);
    session.check_firmware_version()?;
    Ok((path, session))
}


#[cfg(test)]
mod tests {
    use super::*;

    use super::mock::ScriptedTransport;

    #[test]
    fn test_discard_stops_when_line_goes_quiet() {
        let mut port = ScriptedTransport::new();
        port.answer(&[1, 2, 3]);
        port.answer(&[4; 300]);
        port.stall();
        port.answer(&[5]);

        assert_eq!(port.discard_input().unwrap(), 303);
        let mut buf = [0u8; 4];
        assert_eq!(port.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 5);
    }

    #[test]
    fn test_discard_is_bounded_on_a_noisy_line() {
        let mut port = ScriptedTransport::new();
        for _ in 0..DISCARD_READ_LIMIT + 1 {
            port.answer(&[0xFF]);
        }

        assert_eq!(port.discard_input().unwrap(), DISCARD_READ_LIMIT);
        assert_eq!(port.reads(), DISCARD_READ_LIMIT);
    }

    #[test]
    fn test_candidate_paths() {
        let paths: Vec<String> = candidate_paths().collect();
        assert_eq!(paths.len(), 10);
        assert_eq!(paths[0], "/dev/ttyACM0");
        assert_eq!(paths[9], "/dev/ttyACM9");
    }
}
