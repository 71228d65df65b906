//! Frame header codec and resynchronisation
//!
//! Both directions share one header layout:
//! ```text
//! [id: u8][len_msb: u8][len_lsb: u8][address | status: u8][payload: [u8; len]]
//! ```
//! The transport is a plain byte pipe with no delimiters, so a reader that
//! lost its place realigns by discarding bytes until one of them is a valid
//! tag, then collects the remaining header bytes behind it.

use crate::config::protocol::{HEADER_SIZE, USB_PACKET_SIZE};

/// Decoded 4-byte frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Command or answer tag
    pub tag: u8,
    /// Payload length
    pub len: u16,
    /// Register address on commands, status on answers
    pub arg: u8,
}

impl FrameHeader {
    pub fn new(tag: u8, len: u16, arg: u8) -> Self {
        Self { tag, len, arg }
    }

    pub fn from_bytes(bytes: [u8; HEADER_SIZE]) -> Self {
        Self {
            tag: bytes[0],
            len: u16::from_be_bytes([bytes[1], bytes[2]]),
            arg: bytes[3],
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let [msb, lsb] = self.len.to_be_bytes();
        [self.tag, msb, lsb, self.arg]
    }

    pub fn payload_len(&self) -> usize {
        self.len as usize
    }

    /// Status byte of an answer header
    pub fn status(&self) -> u8 {
        self.arg
    }
}

/// Bytes to read after an answer header, including the USB padding byte
///
/// The USB stack appends one byte when the answer ends exactly on a packet
/// boundary.
pub fn padded_body_len(len: usize) -> usize {
    if len > 0 && (len + HEADER_SIZE) % USB_PACKET_SIZE == 0 {
        len + 1
    } else {
        len
    }
}

/// Collects header bytes, discarding anything that cannot start a frame
#[derive(Debug, Clone)]
pub struct HeaderSync {
    buf: [u8; HEADER_SIZE],
    filled: usize,
    discarded: usize,
    accept: fn(u8) -> bool,
}

impl HeaderSync {
    /// Create a synchroniser that accepts frames starting with a byte for which
    /// `accept` returns true
    pub fn new(accept: fn(u8) -> bool) -> Self {
        Self {
            buf: [0; HEADER_SIZE],
            filled: 0,
            discarded: 0,
            accept,
        }
    }

    /// Push a byte into the synchroniser.
    ///
    /// Returns `Some(header)` when the fourth byte behind a valid tag arrives.
    pub fn push(&mut self, byte: u8) -> Option<FrameHeader> {
        if self.filled == 0 && !(self.accept)(byte) {
            self.discarded += 1;
            return None;
        }

        self.buf[self.filled] = byte;
        self.filled += 1;

        if self.filled < HEADER_SIZE {
            return None;
        }

        self.filled = 0;
        Some(FrameHeader::from_bytes(self.buf))
    }

    /// Header bytes still needed; reading no more than this never consumes body bytes
    pub fn missing(&self) -> usize {
        HEADER_SIZE - self.filled
    }

    /// Bytes dropped since the last reset
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Reset the synchroniser, discarding any partial header.
    pub fn reset(&mut self) {
        self.filled = 0;
        self.discarded = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::tag::{is_answer_start, is_command_start};

    #[test]
    fn test_header_layout() {
        let header = FrameHeader::new(b'x', 0x0258, 0x42);
        assert_eq!(header.to_bytes(), [b'x', 0x02, 0x58, 0x42]);
        assert_eq!(FrameHeader::from_bytes([b'x', 0x02, 0x58, 0x42]), header);
        assert_eq!(header.payload_len(), 600);
    }

    #[test]
    fn test_sync_valid_header() {
        let mut sync = HeaderSync::new(is_command_start);

        assert_eq!(sync.push(b'r'), None);
        assert_eq!(sync.push(0x00), None);
        assert_eq!(sync.push(0x01), None);
        let header = sync.push(0x55).unwrap();

        assert_eq!(header, FrameHeader::new(b'r', 1, 0x55));
        assert_eq!(sync.discarded(), 0);
        assert_eq!(sync.missing(), HEADER_SIZE);
    }

    #[test]
    fn test_sync_discards_garbage_prefix() {
        let mut sync = HeaderSync::new(is_answer_start);
        let stream = [0x00, 0xFF, b'\n', b'0', b'p', 0x00, 0x10, 0x01];

        let mut result = None;
        for &byte in &stream {
            if let Some(header) = sync.push(byte) {
                result = Some(header);
            }
        }

        assert_eq!(result, Some(FrameHeader::new(b'p', 16, 0x01)));
        assert_eq!(sync.discarded(), 4);
    }

    #[test]
    fn test_sync_only_checks_leading_byte() {
        // Garbage-valued length bytes are still part of the header once the tag is seen
        let mut sync = HeaderSync::new(is_command_start);
        assert_eq!(sync.push(b'w'), None);
        assert_eq!(sync.missing(), 3);
        assert_eq!(sync.push(0xFF), None);
        assert_eq!(sync.push(0xFF), None);
        assert_eq!(sync.push(0xFF), Some(FrameHeader::new(b'w', 0xFFFF, 0xFF)));
    }

    #[test]
    fn test_sync_reset_drops_partial_header() {
        let mut sync = HeaderSync::new(is_command_start);
        sync.push(b'r');
        sync.push(0x00);
        sync.reset();
        assert_eq!(sync.missing(), HEADER_SIZE);

        for &byte in &[b'q', 0, 0] {
            assert_eq!(sync.push(byte), None);
        }
        assert_eq!(sync.push(0), Some(FrameHeader::new(b'q', 0, 0)));
    }

    #[test]
    fn test_padded_body_len() {
        assert_eq!(padded_body_len(0), 0);
        assert_eq!(padded_body_len(1), 1);
        assert_eq!(padded_body_len(60), 61);
        assert_eq!(padded_body_len(61), 61);
        assert_eq!(padded_body_len(124), 125);
        assert_eq!(padded_body_len(900), 900);
    }
}
