//! Command parser for request frames
//!
//! Turns a header and its payload into a typed [`Command`].

use crate::commands::types::{Command, ParseError};
use crate::config::layout;
use crate::config::protocol::ANSWER_DATA_SIZE;
use crate::protocol::frame::FrameHeader;
use crate::protocol::tag::{CommandTag, Direction};

/// Parser for request frames
pub struct CommandParser;

impl CommandParser {
    /// Create a new command parser
    pub fn new() -> Self {
        Self
    }

    /// Parse a request frame into a command
    ///
    /// `payload` must hold exactly `header.len` bytes.
    pub fn parse<'a>(&self, header: &FrameHeader, payload: &'a [u8]) -> Result<Command<'a>, ParseError> {
        let tag = CommandTag::from_byte(header.tag).ok_or(ParseError::UnknownCommand(header.tag))?;
        let address = header.arg;
        let invalid = || ParseError::InvalidLength {
            tag,
            len: payload.len(),
        };

        if let Some((direction, role)) = tag.burst_role() {
            return match direction {
                Direction::Write => {
                    if payload.is_empty() {
                        return Err(invalid());
                    }
                    Ok(Command::WriteBurst {
                        role,
                        address,
                        data: payload,
                    })
                }
                Direction::Read => {
                    let size = Self::read_size(payload).ok_or_else(invalid)?;
                    if size == 0 {
                        return Err(invalid());
                    }
                    if size > ANSWER_DATA_SIZE {
                        return Err(ParseError::ReadTooLarge { tag, size });
                    }
                    Ok(Command::ReadBurst { role, address, size })
                }
            };
        }

        match tag {
            CommandTag::ReadRegister => Ok(Command::ReadRegister { address }),
            CommandTag::WriteRegister => match payload {
                [value, ..] => Ok(Command::WriteRegister {
                    address,
                    value: *value,
                }),
                [] => Err(invalid()),
            },
            CommandTag::Receive => match payload {
                [max_packets, ..] => Ok(Command::Receive {
                    max_packets: *max_packets,
                }),
                [] => Err(invalid()),
            },
            CommandTag::RxRfSetConf => {
                Self::check_len(payload, layout::RXRF_CONF_SIZE).ok_or_else(invalid)?;
                Ok(Command::RxRfSetConf {
                    rf_chain: address,
                    conf: payload,
                })
            }
            CommandTag::RxIfSetConf => {
                Self::check_len(payload, layout::RXIF_CONF_SIZE).ok_or_else(invalid)?;
                Ok(Command::RxIfSetConf {
                    if_chain: address,
                    conf: payload,
                })
            }
            CommandTag::Send => {
                if payload.len() < layout::TX_METADATA_SIZE {
                    return Err(invalid());
                }
                Ok(Command::Send { packet: payload })
            }
            CommandTag::TxGainSetConf => {
                Self::check_len(payload, layout::TX_GAIN_CONF_SIZE).ok_or_else(invalid)?;
                Ok(Command::TxGainSetConf { lut: payload })
            }
            CommandTag::TriggerCount => Ok(Command::TriggerCount),
            CommandTag::BoardSetConf => {
                Self::check_len(payload, layout::BOARD_CONF_SIZE).ok_or_else(invalid)?;
                Ok(Command::BoardSetConf { conf: payload })
            }
            CommandTag::Calibration => match payload {
                [idx_start, idx_nb, ..] => Ok(Command::Calibration {
                    idx_start: *idx_start,
                    idx_nb: *idx_nb,
                }),
                _ => Err(invalid()),
            },
            CommandTag::FirmwareVersion => match payload {
                [a, b, c, d, ..] => Ok(Command::CheckFirmware {
                    version: u32::from_be_bytes([*a, *b, *c, *d]),
                }),
                _ => Err(invalid()),
            },
            CommandTag::Reset => Ok(Command::Reset),
            CommandTag::Bootloader => Ok(Command::Bootloader),
            // Burst tags were handled above
            _ => Err(ParseError::UnknownCommand(header.tag)),
        }
    }

    /// Requested size of a read chunk
    fn read_size(payload: &[u8]) -> Option<usize> {
        match payload {
            [msb, lsb, ..] => Some(u16::from_be_bytes([*msb, *lsb]) as usize),
            _ => None,
        }
    }

    /// Accept a configuration blob of exactly `expected` bytes
    fn check_len(payload: &[u8], expected: usize) -> Option<()> {
        (payload.len() == expected).then_some(())
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}
