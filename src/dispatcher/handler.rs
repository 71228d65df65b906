//! Command dispatcher
//!
//! Executes decoded commands against the concentrator and builds the answer
//! frame. Register writes are fire-and-forget unless acknowledgements are
//! enabled; every other command is answered.

use crate::commands::serialiser::{AnswerFrame, AnswerSerialiser};
use crate::commands::types::{Command, ParseError};
use crate::concentrator::traits::{Concentrator, ConcentratorError, TxMode};
use crate::config::device::{TX_DONE_POLL_US, TX_DONE_TIMEOUT_MS};
use crate::config::layout::RX_FIFO_PACKETS;
use crate::config::protocol::{ACK_KO, ACK_OK, ANSWER_DATA_SIZE, FIRMWARE_VERSION, HEADER_SIZE, RECEIVE_TRAILER};
use crate::dispatcher::notify::TxDoneFlag;
use crate::protocol::chunking::BurstSequence;
use crate::protocol::frame::FrameHeader;
use crate::protocol::tag::{CommandTag, UNSUPPORTED_TAG};

/// Runtime options of the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Answer register writes with `tag`/0/`ACK_OK`
    pub ack_writes: bool,
    /// Append [`RECEIVE_TRAILER`] to packet-receive answers
    pub receive_trailer: bool,
    /// Pad answers that end on a USB packet boundary
    pub usb_padding: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            ack_writes: false,
            receive_trailer: false,
            usb_padding: true,
        }
    }
}

/// What the event loop does after a dispatch
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome<'a> {
    /// Send this answer frame
    Transmit(&'a [u8]),
    /// Nothing to send
    Skip,
}

#[derive(Debug)]
enum DispatchError {
    Concentrator(ConcentratorError),
    AnswerOverflow,
}

impl From<ConcentratorError> for DispatchError {
    fn from(e: ConcentratorError) -> Self {
        DispatchError::Concentrator(e)
    }
}

/// Command dispatcher
///
/// Owns the answer buffer and the burst ordering state of one session.
pub struct CommandDispatcher<'a> {
    config: DispatcherConfig,
    serialiser: AnswerSerialiser,
    sequence: BurstSequence,
    answer: AnswerFrame,
    tx_done: &'a TxDoneFlag,
}

impl<'a> CommandDispatcher<'a> {
    /// Create a new command dispatcher
    pub fn new(config: DispatcherConfig, tx_done: &'a TxDoneFlag) -> Self {
        Self {
            config,
            serialiser: AnswerSerialiser::new(config.usb_padding),
            sequence: BurstSequence::new(),
            answer: AnswerFrame::new(),
            tx_done,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// True while a multi-chunk burst is open
    pub fn burst_open(&self) -> bool {
        self.sequence.is_open()
    }

    /// Dispatch a command and return what to send back
    pub fn dispatch<C: Concentrator>(&mut self, concentrator: &mut C, command: Command<'_>) -> Outcome<'_> {
        let tag = command.tag();

        let ordering = match command {
            Command::ReadBurst { role, address, .. } | Command::WriteBurst { role, address, .. } => {
                self.sequence.accept(role, address)
            }
            // Reset recovers a burst the host abandoned
            Command::Reset => {
                self.sequence.reset();
                Ok(())
            }
            _ => self.sequence.accept_standalone(),
        };
        if let Err(e) = ordering {
            log::warn!("'{}' refused: {:?}", tag.as_char(), e);
            return self.reject(tag);
        }

        self.serialiser.begin(&mut self.answer);
        match self.execute(concentrator, command) {
            Ok(status) => {
                if tag.is_register_write() && !self.config.ack_writes {
                    return Outcome::Skip;
                }
                self.serialiser.finish(&mut self.answer, tag.as_byte(), status);
                Outcome::Transmit(&self.answer)
            }
            Err(e) => {
                log::error!("'{}' failed: {:?}", tag.as_char(), e);
                // The driver releases chip-select on error
                self.sequence.reset();
                self.reject(tag)
            }
        }
    }

    /// Answer a request the parser refused
    pub fn reject_parse(&mut self, error: ParseError) -> Outcome<'_> {
        log::warn!("request refused: {:?}", error);
        match error {
            ParseError::UnknownCommand(_) => self.unsupported(),
            ParseError::InvalidLength { tag, .. } | ParseError::ReadTooLarge { tag, .. } => self.reject(tag),
        }
    }

    /// Answer a request whose payload did not fit the request buffer
    pub fn reject_oversized(&mut self, header: FrameHeader) -> Outcome<'_> {
        self.reject_raw(header.tag)
    }

    /// Answer a request with invalid hex digits
    pub fn reject_malformed(&mut self, tag: u8) -> Outcome<'_> {
        self.reject_raw(tag)
    }

    fn reject_raw(&mut self, tag: u8) -> Outcome<'_> {
        match CommandTag::from_byte(tag) {
            Some(tag) => self.reject(tag),
            None => self.unsupported(),
        }
    }

    fn reject(&mut self, tag: CommandTag) -> Outcome<'_> {
        if tag.is_register_write() && !self.config.ack_writes {
            return Outcome::Skip;
        }
        self.serialiser.empty(&mut self.answer, tag.as_byte(), ACK_KO);
        Outcome::Transmit(&self.answer)
    }

    fn unsupported(&mut self) -> Outcome<'_> {
        self.serialiser.empty(&mut self.answer, UNSUPPORTED_TAG, ACK_KO);
        Outcome::Transmit(&self.answer)
    }

    /// Run a command, appending answer data behind the reserved header
    fn execute<C: Concentrator>(&mut self, concentrator: &mut C, command: Command<'_>) -> Result<u8, DispatchError> {
        match command {
            Command::ReadRegister { address } => {
                let value = concentrator.spi_read(address)?;
                self.push(&[value])?;
            }
            Command::ReadBurst { role, address, size } => {
                let data = self.extend(size)?;
                concentrator.read_burst(role, address, data)?;
            }
            Command::WriteRegister { address, value } => concentrator.spi_write(address, value)?,
            Command::WriteBurst { role, address, data } => concentrator.write_burst(role, address, data)?,
            Command::Receive { max_packets } => self.receive(concentrator, max_packets)?,
            Command::RxRfSetConf { rf_chain, conf } => concentrator.rxrf_setconf(rf_chain, conf)?,
            Command::RxIfSetConf { if_chain, conf } => concentrator.rxif_setconf(if_chain, conf)?,
            Command::Send { packet } => return self.send(concentrator, packet),
            Command::TxGainSetConf { lut } => concentrator.txgain_setconf(lut)?,
            Command::TriggerCount => {
                let count = concentrator.trigger_count()?;
                self.push(&count.to_be_bytes())?;
            }
            Command::BoardSetConf { conf } => concentrator.board_setconf(conf)?,
            Command::Calibration { idx_start, idx_nb } => concentrator.calibration_transfer(idx_start, idx_nb)?,
            Command::CheckFirmware { version } => {
                self.push(&concentrator.unique_id())?;
                if version != FIRMWARE_VERSION {
                    log::warn!("host expects firmware {:#010x}, running {:#010x}", version, FIRMWARE_VERSION);
                    return Ok(ACK_KO);
                }
            }
            Command::Reset => concentrator.soft_reset()?,
            Command::Bootloader => concentrator.enter_bootloader()?,
        }
        Ok(ACK_OK)
    }

    /// `[count][metadata + payload]...`, optionally followed by the trailer
    fn receive<C: Concentrator>(&mut self, concentrator: &mut C, max_packets: u8) -> Result<(), DispatchError> {
        let max_packets = max_packets.min(RX_FIFO_PACKETS as u8);
        let trailer = if self.config.receive_trailer { RECEIVE_TRAILER.len() } else { 0 };

        let room = ANSWER_DATA_SIZE - 1 - trailer;
        self.push(&[0])?;
        let area = self.extend(room)?;
        let (count, used) = concentrator.receive(max_packets, area)?;

        self.answer.truncate(HEADER_SIZE + 1 + used.min(room));
        self.answer[HEADER_SIZE] = count;
        if trailer > 0 {
            self.push(&RECEIVE_TRAILER)?;
        }
        if count > 0 {
            log::debug!("{} packets fetched", count);
        }
        Ok(())
    }

    /// Start a transmission and wait for the TX-done interrupt
    fn send<C: Concentrator>(&mut self, concentrator: &mut C, packet: &[u8]) -> Result<u8, DispatchError> {
        self.tx_done.clear();
        if concentrator.send(packet)? == TxMode::Continuous {
            return Ok(ACK_OK);
        }

        let polls = TX_DONE_TIMEOUT_MS * 1_000 / TX_DONE_POLL_US;
        let mut completed = false;
        for _ in 0..polls {
            if self.tx_done.take() {
                completed = true;
                break;
            }
            concentrator.delay_us(TX_DONE_POLL_US);
        }

        concentrator.finish_send(completed)?;
        if completed {
            Ok(ACK_OK)
        } else {
            log::warn!("no TX-done within {} ms", TX_DONE_TIMEOUT_MS);
            Ok(ACK_KO)
        }
    }

    fn push(&mut self, data: &[u8]) -> Result<(), DispatchError> {
        self.answer.extend_from_slice(data).map_err(|_| DispatchError::AnswerOverflow)
    }

    /// Grow the answer by `len` zeroed bytes and return them
    fn extend(&mut self, len: usize) -> Result<&mut [u8], DispatchError> {
        let start = self.answer.len();
        self.answer
            .resize_default(start + len)
            .map_err(|_| DispatchError::AnswerOverflow)?;
        Ok(&mut self.answer[start..])
    }
}
