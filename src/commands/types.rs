//! Decoded command types
//!
//! # Request payloads
//!
//! | Tag       | Address field | Payload                                  |
//! |-----------|---------------|------------------------------------------|
//! | `r`       | register      | 1 ignored byte                           |
//! | `s t u p` | register      | requested size, `u16` big-endian         |
//! | `w`       | register      | value                                    |
//! | `x y z a` | register      | data bytes                               |
//! | `b`       | -             | maximum packet count                     |
//! | `c`       | RF chain      | packed RF chain configuration            |
//! | `d`       | IF chain      | packed IF chain configuration            |
//! | `f`       | -             | packed TX metadata and payload           |
//! | `h`       | -             | packed TX gain table                     |
//! | `q`       | -             | none                                     |
//! | `i`       | -             | packed board configuration               |
//! | `j`       | -             | `[idx_start][idx_nb]`                    |
//! | `l`       | -             | host firmware version, `u32` big-endian  |
//! | `m`, `n`  | -             | none                                     |
//!
//! Configuration blobs are forwarded to the concentrator untouched.

use crate::protocol::chunking::ChunkRole;
use crate::protocol::tag::CommandTag;

/// Parsed command borrowing its payload from the request buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    ReadRegister { address: u8 },
    ReadBurst { role: ChunkRole, address: u8, size: usize },
    WriteRegister { address: u8, value: u8 },
    WriteBurst { role: ChunkRole, address: u8, data: &'a [u8] },
    Receive { max_packets: u8 },
    RxRfSetConf { rf_chain: u8, conf: &'a [u8] },
    RxIfSetConf { if_chain: u8, conf: &'a [u8] },
    Send { packet: &'a [u8] },
    TxGainSetConf { lut: &'a [u8] },
    TriggerCount,
    BoardSetConf { conf: &'a [u8] },
    Calibration { idx_start: u8, idx_nb: u8 },
    CheckFirmware { version: u32 },
    Reset,
    Bootloader,
}

impl Command<'_> {
    /// Get the tag for this command
    pub fn tag(&self) -> CommandTag {
        use crate::protocol::tag::Direction;

        match self {
            Command::ReadRegister { .. } => CommandTag::ReadRegister,
            Command::ReadBurst { role, .. } => CommandTag::burst(Direction::Read, *role),
            Command::WriteRegister { .. } => CommandTag::WriteRegister,
            Command::WriteBurst { role, .. } => CommandTag::burst(Direction::Write, *role),
            Command::Receive { .. } => CommandTag::Receive,
            Command::RxRfSetConf { .. } => CommandTag::RxRfSetConf,
            Command::RxIfSetConf { .. } => CommandTag::RxIfSetConf,
            Command::Send { .. } => CommandTag::Send,
            Command::TxGainSetConf { .. } => CommandTag::TxGainSetConf,
            Command::TriggerCount => CommandTag::TriggerCount,
            Command::BoardSetConf { .. } => CommandTag::BoardSetConf,
            Command::Calibration { .. } => CommandTag::Calibration,
            Command::CheckFirmware { .. } => CommandTag::FirmwareVersion,
            Command::Reset => CommandTag::Reset,
            Command::Bootloader => CommandTag::Bootloader,
        }
    }
}

/// Reasons a request frame is refused before reaching the concentrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Leading byte outside the tag alphabet
    UnknownCommand(u8),
    /// Payload length invalid for the command
    InvalidLength { tag: CommandTag, len: usize },
    /// Requested read does not fit the answer buffer
    ReadTooLarge { tag: CommandTag, size: usize },
}

impl ParseError {
    /// Raw tag of the refused frame
    pub fn tag_byte(&self) -> u8 {
        match self {
            ParseError::UnknownCommand(byte) => *byte,
            ParseError::InvalidLength { tag, .. } | ParseError::ReadTooLarge { tag, .. } => {
                tag.as_byte()
            }
        }
    }
}
