//! ASCII-hex request encoding used by early bridge firmware
//!
//! Requests are sent as the tag byte followed by lowercase hex digit pairs:
//! ```text
//! [tag][len_msb:2][len_lsb:2][address:2][payload: 2 * len]
//! ```
//! Answers are always binary. Decoding is strict: any character outside
//! `0-9`, `a-f` and `A-F` rejects the frame.

use crate::protocol::frame::FrameHeader;

/// Characters in an encoded header after the tag
pub const ASCII_HEADER_DIGITS: usize = 6;

/// Errors from hex decoding and encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexError {
    /// Byte is not a hex digit
    InvalidDigit(u8),
    /// Odd number of digits
    OddLength,
    /// Output buffer too small
    BufferTooSmall,
}

const DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Decode one hex digit
pub fn decode_nibble(c: u8) -> Result<u8, HexError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(HexError::InvalidDigit(c)),
    }
}

/// Decode a digit pair, most significant nibble first
pub fn decode_pair(high: u8, low: u8) -> Result<u8, HexError> {
    Ok((decode_nibble(high)? << 4) | decode_nibble(low)?)
}

/// Encode a byte as two lowercase hex digits
pub fn encode_byte(byte: u8) -> [u8; 2] {
    [DIGITS[(byte >> 4) as usize], DIGITS[(byte & 0x0F) as usize]]
}

/// Decode `src` digit pairs into `dst`, returning the number of bytes written
pub fn decode_into(src: &[u8], dst: &mut [u8]) -> Result<usize, HexError> {
    if src.len() % 2 != 0 {
        return Err(HexError::OddLength);
    }
    let count = src.len() / 2;
    if dst.len() < count {
        return Err(HexError::BufferTooSmall);
    }

    for (out, pair) in dst.iter_mut().zip(src.chunks_exact(2)) {
        *out = decode_pair(pair[0], pair[1])?;
    }
    Ok(count)
}

/// Decode the six digits that follow the tag of an ASCII request
pub fn decode_header(tag: u8, digits: &[u8; ASCII_HEADER_DIGITS]) -> Result<FrameHeader, HexError> {
    let msb = decode_pair(digits[0], digits[1])?;
    let lsb = decode_pair(digits[2], digits[3])?;
    let address = decode_pair(digits[4], digits[5])?;
    Ok(FrameHeader::new(tag, u16::from_be_bytes([msb, lsb]), address))
}

/// Size of an encoded request carrying `payload_len` bytes
pub fn encoded_request_len(payload_len: usize) -> usize {
    1 + ASCII_HEADER_DIGITS + payload_len * 2
}

/// Encode a request into `out`, returning the number of bytes written
pub fn encode_request(header: &FrameHeader, payload: &[u8], out: &mut [u8]) -> Result<usize, HexError> {
    let total = encoded_request_len(payload.len());
    if out.len() < total {
        return Err(HexError::BufferTooSmall);
    }

    let bytes = header.to_bytes();
    out[0] = bytes[0];
    for (i, &byte) in bytes[1..].iter().chain(payload.iter()).enumerate() {
        out[1 + i * 2..3 + i * 2].copy_from_slice(&encode_byte(byte));
    }
    Ok(total)
}
