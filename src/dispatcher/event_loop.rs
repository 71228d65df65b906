//! Device event loop
//!
//! One request at a time: wait for a frame, decode it, dispatch it, send the
//! answer if there is one, then wait again.

use crate::commands::parser::CommandParser;
use crate::concentrator::traits::Concentrator;
use crate::dispatcher::handler::{CommandDispatcher, DispatcherConfig, Outcome};
use crate::dispatcher::notify::TxDoneFlag;
use crate::protocol::WireEncoding;
use crate::serial::reader::{FrameReader, ReadResult};
use crate::serial::traits::{SerialError, SerialPort};

/// Result of one pass through the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
    /// An answer frame was sent
    Answered,
    /// A request was handled without an answer
    Skipped,
    /// No request was pending
    Idle,
}

/// Bridge between the serial link and the concentrator
pub struct DeviceBridge<'a, S: SerialPort, C: Concentrator> {
    serial: S,
    concentrator: C,
    reader: FrameReader,
    parser: CommandParser,
    dispatcher: CommandDispatcher<'a>,
}

impl<'a, S: SerialPort, C: Concentrator> DeviceBridge<'a, S, C> {
    pub fn new(
        serial: S,
        concentrator: C,
        encoding: WireEncoding,
        config: DispatcherConfig,
        tx_done: &'a TxDoneFlag,
    ) -> Self {
        Self {
            serial,
            concentrator,
            reader: FrameReader::new(encoding),
            parser: CommandParser::new(),
            dispatcher: CommandDispatcher::new(config, tx_done),
        }
    }

    /// Handle at most one request
    pub async fn serve_once(&mut self) -> Result<Served, SerialError> {
        let outcome = match self.reader.read_frame(&mut self.serial).await {
            ReadResult::Frame { header, payload } => match self.parser.parse(&header, payload) {
                Ok(command) => {
                    log::debug!("'{}' len={} arg={:#04x}", header.tag as char, header.len, header.arg);
                    self.dispatcher.dispatch(&mut self.concentrator, command)
                }
                Err(e) => self.dispatcher.reject_parse(e),
            },
            ReadResult::Oversized(header) => self.dispatcher.reject_oversized(header),
            ReadResult::Malformed(tag) => self.dispatcher.reject_malformed(tag),
            ReadResult::Idle => return Ok(Served::Idle),
            ReadResult::SerialError(e) => return Err(e),
        };

        match outcome {
            Outcome::Transmit(frame) => {
                self.serial.write(frame).await?;
                self.serial.flush().await?;
                Ok(Served::Answered)
            }
            Outcome::Skip => Ok(Served::Skipped),
        }
    }

    pub fn concentrator(&self) -> &C {
        &self.concentrator
    }

    pub fn serial(&self) -> &S {
        &self.serial
    }
}
