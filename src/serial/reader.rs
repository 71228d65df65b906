//! Request frame reader
//!
//! Collects request frames from a serial port. The reader keeps its state
//! between calls, so a port that runs dry mid-frame resumes where it left off.
//! It never reads past the end of the current frame.

use crate::config::protocol::COMMAND_DATA_SIZE;
use crate::protocol::frame::{FrameHeader, HeaderSync};
use crate::protocol::hex::{self, ASCII_HEADER_DIGITS};
use crate::protocol::tag::is_command_start;
use crate::protocol::WireEncoding;
use crate::serial::traits::{SerialError, SerialPort};

/// Result of attempting to read a request frame
#[derive(Debug, PartialEq, Eq)]
pub enum ReadResult<'a> {
    /// A complete frame whose payload fits the request buffer
    Frame { header: FrameHeader, payload: &'a [u8] },
    /// Declared length exceeds the request buffer; the payload was drained
    Oversized(FrameHeader),
    /// Invalid hex character in an ASCII request with the given tag
    Malformed(u8),
    /// The port had no data
    Idle,
    /// Serial error
    SerialError(SerialError),
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    /// Waiting for a tag and the rest of the header
    Header,
    /// ASCII request: collecting the six header digits
    AsciiHeader { tag: u8, filled: usize },
    /// Collecting the payload
    Body { header: FrameHeader, filled: usize },
    /// Discarding the rest of a payload that cannot be used
    Drain {
        header: FrameHeader,
        remaining: usize,
        malformed: bool,
    },
}

/// Request frame reader
pub struct FrameReader {
    encoding: WireEncoding,
    sync: HeaderSync,
    phase: Phase,
    ascii_digits: [u8; ASCII_HEADER_DIGITS],
    /// High nibble waiting for its partner in ASCII mode
    pending_nibble: Option<u8>,
    payload: [u8; COMMAND_DATA_SIZE],
}

impl FrameReader {
    /// Create a new frame reader
    pub fn new(encoding: WireEncoding) -> Self {
        Self {
            encoding,
            sync: HeaderSync::new(is_command_start),
            phase: Phase::Header,
            ascii_digits: [0; ASCII_HEADER_DIGITS],
            pending_nibble: None,
            payload: [0; COMMAND_DATA_SIZE],
        }
    }

    pub fn encoding(&self) -> WireEncoding {
        self.encoding
    }

    /// Read until a frame is complete, the port runs dry, or an error occurs
    pub async fn read_frame<S: SerialPort>(&mut self, serial: &mut S) -> ReadResult<'_> {
        let mut buf = [0u8; 64];

        loop {
            let want = self.wanted().min(buf.len());
            let bytes_read = match serial.read(&mut buf[..want]).await {
                Ok(0) => return ReadResult::Idle,
                Ok(n) => n,
                Err(e) => {
                    self.reset();
                    return ReadResult::SerialError(e);
                }
            };

            for &byte in &buf[..bytes_read] {
                if let Some(event) = self.push(byte) {
                    return match event {
                        Event::Frame(header) => ReadResult::Frame {
                            header,
                            payload: &self.payload[..header.payload_len()],
                        },
                        Event::Oversized(header) => ReadResult::Oversized(header),
                        Event::Malformed(tag) => ReadResult::Malformed(tag),
                    };
                }
            }
        }
    }

    /// Discard any partial frame
    pub fn reset(&mut self) {
        self.sync.reset();
        self.phase = Phase::Header;
        self.pending_nibble = None;
    }

    /// Bytes that can be read without running into the next frame
    fn wanted(&self) -> usize {
        match (self.phase, self.encoding) {
            (Phase::Header, WireEncoding::Binary) => self.sync.missing(),
            (Phase::Header, WireEncoding::AsciiHex) => 1,
            (Phase::AsciiHeader { filled, .. }, _) => ASCII_HEADER_DIGITS - filled,
            (Phase::Body { header, filled }, encoding) => wire_len(encoding, header.payload_len()) - self.wire_filled(filled),
            (Phase::Drain { remaining, .. }, _) => remaining,
        }
    }

    /// Wire bytes already consumed for a body with `filled` decoded bytes
    fn wire_filled(&self, filled: usize) -> usize {
        match self.encoding {
            WireEncoding::Binary => filled,
            WireEncoding::AsciiHex => filled * 2 + usize::from(self.pending_nibble.is_some()),
        }
    }

    fn push(&mut self, byte: u8) -> Option<Event> {
        match self.phase {
            Phase::Header => match self.encoding {
                WireEncoding::Binary => {
                    let header = self.sync.push(byte)?;
                    if self.sync.discarded() > 0 {
                        log::warn!("discarded {} bytes before '{}' request", self.sync.discarded(), header.tag as char);
                    }
                    self.sync.reset();
                    self.start_body(header)
                }
                WireEncoding::AsciiHex => {
                    if is_command_start(byte) {
                        self.phase = Phase::AsciiHeader { tag: byte, filled: 0 };
                    }
                    None
                }
            },
            Phase::AsciiHeader { tag, filled } => {
                self.ascii_digits[filled] = byte;
                let filled = filled + 1;
                if filled < ASCII_HEADER_DIGITS {
                    self.phase = Phase::AsciiHeader { tag, filled };
                    return None;
                }

                match hex::decode_header(tag, &self.ascii_digits) {
                    Ok(header) => self.start_body(header),
                    Err(_) => {
                        self.reset();
                        Some(Event::Malformed(tag))
                    }
                }
            }
            Phase::Body { header, filled } => {
                let value = match self.encoding {
                    WireEncoding::Binary => byte,
                    WireEncoding::AsciiHex => {
                        let nibble = match hex::decode_nibble(byte) {
                            Ok(n) => n,
                            Err(_) => return self.malformed_body(header, filled),
                        };
                        match self.pending_nibble.take() {
                            None => {
                                self.pending_nibble = Some(nibble);
                                return None;
                            }
                            Some(high) => (high << 4) | nibble,
                        }
                    }
                };

                self.payload[filled] = value;
                let filled = filled + 1;
                if filled < header.payload_len() {
                    self.phase = Phase::Body { header, filled };
                    return None;
                }

                self.phase = Phase::Header;
                Some(Event::Frame(header))
            }
            Phase::Drain {
                header,
                remaining,
                malformed,
            } => {
                let remaining = remaining - 1;
                if remaining > 0 {
                    self.phase = Phase::Drain {
                        header,
                        remaining,
                        malformed,
                    };
                    return None;
                }
                self.phase = Phase::Header;
                Some(Self::drained(header, malformed))
            }
        }
    }

    fn start_body(&mut self, header: FrameHeader) -> Option<Event> {
        let len = header.payload_len();
        if len > COMMAND_DATA_SIZE {
            log::warn!("'{}' request of {} bytes exceeds {} byte buffer", header.tag as char, len, COMMAND_DATA_SIZE);
            self.phase = Phase::Drain {
                header,
                remaining: wire_len(self.encoding, len),
                malformed: false,
            };
            return None;
        }

        if len == 0 {
            self.phase = Phase::Header;
            return Some(Event::Frame(header));
        }

        self.pending_nibble = None;
        self.phase = Phase::Body { header, filled: 0 };
        None
    }

    /// Bad digit in an ASCII body: drain the rest of it, then report
    fn malformed_body(&mut self, header: FrameHeader, filled: usize) -> Option<Event> {
        let consumed = self.wire_filled(filled) + 1;
        let remaining = wire_len(self.encoding, header.payload_len()) - consumed;
        self.pending_nibble = None;
        log::warn!("invalid hex digit in '{}' request", header.tag as char);

        if remaining == 0 {
            self.phase = Phase::Header;
            return Some(Self::drained(header, true));
        }
        self.phase = Phase::Drain {
            header,
            remaining,
            malformed: true,
        };
        None
    }

    fn drained(header: FrameHeader, malformed: bool) -> Event {
        if malformed {
            Event::Malformed(header.tag)
        } else {
            Event::Oversized(header)
        }
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new(WireEncoding::Binary)
    }
}

enum Event {
    Frame(FrameHeader),
    Oversized(FrameHeader),
    Malformed(u8),
}

/// Wire bytes carrying `len` payload bytes
fn wire_len(encoding: WireEncoding, len: usize) -> usize {
    match encoding {
        WireEncoding::Binary => len,
        WireEncoding::AsciiHex => len * 2,
    }
}
