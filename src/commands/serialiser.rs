//! Answer serialiser
//!
//! Answers are built in place: the dispatcher reserves the header, appends
//! the answer data behind it, then the serialiser stamps the header.
//!
//! ```text
//! [tag: u8][len_msb: u8][len_lsb: u8][status: u8][data: [u8; len]][pad?]
//! ```

use crate::config::protocol::{ANSWER_DATA_SIZE, HEADER_SIZE, MAX_ANSWER_FRAME};
use crate::protocol::frame::{padded_body_len, FrameHeader};
use heapless::Vec;

/// Answer frame buffer
pub type AnswerFrame = Vec<u8, MAX_ANSWER_FRAME>;

// Header, the largest answer and its padding byte always fit
const _: () = assert!(MAX_ANSWER_FRAME >= HEADER_SIZE + ANSWER_DATA_SIZE + 1);

/// Serialiser for answer frames
pub struct AnswerSerialiser {
    usb_padding: bool,
}

impl AnswerSerialiser {
    /// Create a serialiser; with `usb_padding` a filler byte is appended when
    /// the answer ends exactly on a USB packet boundary
    pub fn new(usb_padding: bool) -> Self {
        Self { usb_padding }
    }

    /// Clear `frame` and reserve the header
    pub fn begin(&self, frame: &mut AnswerFrame) {
        frame.clear();
        let _ = frame.resize_default(HEADER_SIZE);
    }

    /// Stamp the header over the data already in `frame`
    pub fn finish(&self, frame: &mut AnswerFrame, tag: u8, status: u8) {
        if frame.len() < HEADER_SIZE {
            self.begin(frame);
        }

        let len = frame.len() - HEADER_SIZE;
        let header = FrameHeader::new(tag, len as u16, status);
        frame[..HEADER_SIZE].copy_from_slice(&header.to_bytes());

        if self.usb_padding && padded_body_len(len) > len {
            // Data is capped at ANSWER_DATA_SIZE, so the pad byte has room
            let pushed = frame.push(0);
            debug_assert!(pushed.is_ok());
        }
    }

    /// Build an answer with no data
    pub fn empty(&self, frame: &mut AnswerFrame, tag: u8, status: u8) {
        self.begin(frame);
        self.finish(frame, tag, status);
    }
}

impl Default for AnswerSerialiser {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::protocol::{ACK_KO, ACK_OK};

    #[test]
    fn test_empty_answer() {
        let serialiser = AnswerSerialiser::default();
        let mut frame = AnswerFrame::new();

        serialiser.empty(&mut frame, b'k', ACK_KO);
        assert_eq!(frame.as_slice(), &[b'k', 0, 0, ACK_KO]);
    }

    #[test]
    fn test_answer_with_data() {
        let serialiser = AnswerSerialiser::default();
        let mut frame = AnswerFrame::new();

        serialiser.begin(&mut frame);
        frame.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        serialiser.finish(&mut frame, b'q', ACK_OK);

        assert_eq!(frame.as_slice(), &[b'q', 0, 4, ACK_OK, 0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_long_answer_length_is_big_endian() {
        let serialiser = AnswerSerialiser::default();
        let mut frame = AnswerFrame::new();

        serialiser.begin(&mut frame);
        frame.resize_default(HEADER_SIZE + 900).unwrap();
        serialiser.finish(&mut frame, b's', ACK_OK);

        assert_eq!(&frame[..HEADER_SIZE], &[b's', 0x03, 0x84, ACK_OK]);
        assert_eq!(frame.len(), HEADER_SIZE + 900);
    }

    #[test]
    fn test_usb_padding_on_packet_boundary() {
        let padded = AnswerSerialiser::new(true);
        let plain = AnswerSerialiser::new(false);
        let mut frame = AnswerFrame::new();

        // 60 data bytes + 4 header bytes fill one 64-byte packet
        padded.begin(&mut frame);
        frame.resize_default(HEADER_SIZE + 60).unwrap();
        padded.finish(&mut frame, b'p', ACK_OK);
        assert_eq!(frame.len(), 65);
        assert_eq!(&frame[..HEADER_SIZE], &[b'p', 0, 60, ACK_OK]);

        plain.begin(&mut frame);
        frame.resize_default(HEADER_SIZE + 60).unwrap();
        plain.finish(&mut frame, b'p', ACK_OK);
        assert_eq!(frame.len(), 64);

        padded.begin(&mut frame);
        frame.resize_default(HEADER_SIZE + 61).unwrap();
        padded.finish(&mut frame, b'p', ACK_OK);
        assert_eq!(frame.len(), 65);
    }

    #[test]
    fn test_largest_padded_answer_fits() {
        let serialiser = AnswerSerialiser::new(true);
        let mut frame = AnswerFrame::new();

        // Largest data length that still ends on a packet boundary
        let len = (HEADER_SIZE + ANSWER_DATA_SIZE) / 64 * 64 - HEADER_SIZE;
        serialiser.begin(&mut frame);
        frame.resize_default(HEADER_SIZE + len).unwrap();
        serialiser.finish(&mut frame, b'p', ACK_OK);

        assert_eq!(frame.len(), HEADER_SIZE + len + 1);
        assert_eq!(frame.last(), Some(&0));
    }
}
