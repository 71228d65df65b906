//! Command tag alphabet
//!
//! Every frame starts with a single ASCII tag. The alphabet is closed: any
//! other leading byte is noise and is discarded while resynchronising.
//!
//! | Tag | Operation                   | Tag | Operation                    |
//! |-----|-----------------------------|-----|------------------------------|
//! | `r` | read register               | `w` | write register               |
//! | `s` | read burst, first chunk     | `x` | write burst, first chunk     |
//! | `t` | read burst, middle chunk    | `y` | write burst, middle chunk    |
//! | `u` | read burst, end chunk       | `z` | write burst, end chunk       |
//! | `p` | read burst, atomic          | `a` | write burst, atomic          |
//! | `b` | fetch received packets      | `c` | RF chain configuration       |
//! | `d` | IF chain configuration      | `f` | send packet                  |
//! | `h` | TX gain table               | `q` | read trigger counter         |
//! | `i` | board configuration         | `j` | radio calibration transfer   |
//! | `l` | firmware check / unique id  | `m` | reset                        |
//! | `n` | jump to bootloader          |     |                              |
//!
//! Answers reuse the request tag, except `k` which marks an unsupported command.

use crate::protocol::chunking::ChunkRole;

/// Answer tag sent back for a command the device does not know
pub const UNSUPPORTED_TAG: u8 = b'k';

/// Transfer direction of a register operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// Command tags understood by the device decoder
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTag {
    ReadRegister = b'r',
    ReadBurstFirst = b's',
    ReadBurstMiddle = b't',
    ReadBurstEnd = b'u',
    ReadBurstAtomic = b'p',
    WriteRegister = b'w',
    WriteBurstFirst = b'x',
    WriteBurstMiddle = b'y',
    WriteBurstEnd = b'z',
    WriteBurstAtomic = b'a',
    Receive = b'b',
    RxRfSetConf = b'c',
    RxIfSetConf = b'd',
    Send = b'f',
    TxGainSetConf = b'h',
    TriggerCount = b'q',
    BoardSetConf = b'i',
    Calibration = b'j',
    FirmwareVersion = b'l',
    Reset = b'm',
    Bootloader = b'n',
}

impl CommandTag {
    /// Try to convert a byte to a CommandTag
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'r' => Some(Self::ReadRegister),
            b's' => Some(Self::ReadBurstFirst),
            b't' => Some(Self::ReadBurstMiddle),
            b'u' => Some(Self::ReadBurstEnd),
            b'p' => Some(Self::ReadBurstAtomic),
            b'w' => Some(Self::WriteRegister),
            b'x' => Some(Self::WriteBurstFirst),
            b'y' => Some(Self::WriteBurstMiddle),
            b'z' => Some(Self::WriteBurstEnd),
            b'a' => Some(Self::WriteBurstAtomic),
            b'b' => Some(Self::Receive),
            b'c' => Some(Self::RxRfSetConf),
            b'd' => Some(Self::RxIfSetConf),
            b'f' => Some(Self::Send),
            b'h' => Some(Self::TxGainSetConf),
            b'q' => Some(Self::TriggerCount),
            b'i' => Some(Self::BoardSetConf),
            b'j' => Some(Self::Calibration),
            b'l' => Some(Self::FirmwareVersion),
            b'm' => Some(Self::Reset),
            b'n' => Some(Self::Bootloader),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn as_char(self) -> char {
        self as u8 as char
    }

    /// Tag for one chunk of a burst in the given direction
    pub fn burst(direction: Direction, role: ChunkRole) -> Self {
        match (direction, role) {
            (Direction::Read, ChunkRole::First) => Self::ReadBurstFirst,
            (Direction::Read, ChunkRole::Middle) => Self::ReadBurstMiddle,
            (Direction::Read, ChunkRole::End) => Self::ReadBurstEnd,
            (Direction::Read, ChunkRole::Atomic) => Self::ReadBurstAtomic,
            (Direction::Write, ChunkRole::First) => Self::WriteBurstFirst,
            (Direction::Write, ChunkRole::Middle) => Self::WriteBurstMiddle,
            (Direction::Write, ChunkRole::End) => Self::WriteBurstEnd,
            (Direction::Write, ChunkRole::Atomic) => Self::WriteBurstAtomic,
        }
    }

    /// Direction and chunk role, for burst tags only
    pub fn burst_role(self) -> Option<(Direction, ChunkRole)> {
        match self {
            Self::ReadBurstFirst => Some((Direction::Read, ChunkRole::First)),
            Self::ReadBurstMiddle => Some((Direction::Read, ChunkRole::Middle)),
            Self::ReadBurstEnd => Some((Direction::Read, ChunkRole::End)),
            Self::ReadBurstAtomic => Some((Direction::Read, ChunkRole::Atomic)),
            Self::WriteBurstFirst => Some((Direction::Write, ChunkRole::First)),
            Self::WriteBurstMiddle => Some((Direction::Write, ChunkRole::Middle)),
            Self::WriteBurstEnd => Some((Direction::Write, ChunkRole::End)),
            Self::WriteBurstAtomic => Some((Direction::Write, ChunkRole::Atomic)),
            _ => None,
        }
    }

    /// Register writes, which are fire-and-forget unless acknowledgements are enabled
    pub fn is_register_write(self) -> bool {
        matches!(
            self,
            Self::WriteRegister
                | Self::WriteBurstFirst
                | Self::WriteBurstMiddle
                | Self::WriteBurstEnd
                | Self::WriteBurstAtomic
        )
    }
}

/// True if `byte` can start a command frame
pub fn is_command_start(byte: u8) -> bool {
    CommandTag::from_byte(byte).is_some()
}

/// True if `byte` can start an answer frame
pub fn is_answer_start(byte: u8) -> bool {
    byte == UNSUPPORTED_TAG || is_command_start(byte)
}
