//! Host side of the command bridge.
//!
//! One request is in flight at a time. A request is written in full, then the
//! session waits for the matching answer:
//!
//! ```text
//! Idle -> Sent -> AwaitingHeader -> AwaitingBody -> Complete
//!                       |                 |
//!                       +---- Failed <----+
//! ```
//!
//! The header wait skips bytes that cannot start an answer and gives up after
//! a fixed number of reads. Once a header is in, the session sleeps long
//! enough for the device to fill the body, then reads it, including the USB
//! padding byte when the answer ends on a packet boundary.

use std::io::{ErrorKind, Read, Write};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use lgw_bridge::config::host::{ANSWER_RETRY_LIMIT, SETTLE_NS_PER_BYTE};
use lgw_bridge::config::protocol::{
    ACK_OK, ANSWER_DATA_SIZE, COMMAND_DATA_SIZE, HEADER_SIZE, MAX_ANSWER_FRAME, READ_CHUNK_SIZE,
    WRITE_CHUNK_SIZE,
};
use lgw_bridge::protocol::hex::{encode_request, encoded_request_len};
use lgw_bridge::protocol::tag::is_answer_start;
use lgw_bridge::protocol::{padded_body_len, CommandTag, FrameHeader, HeaderSync, WireEncoding, UNSUPPORTED_TAG};

use crate::error::{BridgeError, Result};
use crate::transport::Transport;

/// Session options; both ends must agree on padding, acks and the trailer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Largest write burst chunk
    pub write_chunk: usize,
    /// Largest read burst chunk
    pub read_chunk: usize,
    /// Reads allowed while waiting for a header or a stalled body
    pub retry_limit: u32,
    /// Device fill time per answer byte
    pub settle_per_byte: Duration,
    /// Expect a padding byte after answers ending on a USB packet boundary
    pub usb_padding: bool,
    /// Wait for an acknowledgement after each register write
    pub write_acks: bool,
    /// Packet-receive answers end with the trailer sentinel
    pub receive_trailer: bool,
    /// Request encoding
    pub encoding: WireEncoding,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            write_chunk: WRITE_CHUNK_SIZE,
            read_chunk: READ_CHUNK_SIZE,
            retry_limit: ANSWER_RETRY_LIMIT,
            settle_per_byte: Duration::from_nanos(SETTLE_NS_PER_BYTE),
            usb_padding: true,
            write_acks: false,
            receive_trailer: false,
            encoding: WireEncoding::Binary,
        }
    }
}

impl BridgeConfig {
    /// Clamp chunk sizes to what fits the device buffers
    fn normalised(mut self) -> Self {
        self.write_chunk = self.write_chunk.clamp(1, COMMAND_DATA_SIZE);
        self.read_chunk = self.read_chunk.clamp(1, ANSWER_DATA_SIZE);
        self.retry_limit = self.retry_limit.max(1);
        self
    }
}

/// A complete answer frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub tag: u8,
    pub status: u8,
    pub data: Vec<u8>,
}

impl Answer {
    pub fn is_ok(&self) -> bool {
        self.status == ACK_OK
    }

    /// Turn a KO status into [`BridgeError::Nack`]
    pub fn ensure_ok(self) -> Result<Self> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(BridgeError::Nack(self.tag as char))
        }
    }
}

/// Progress of the current exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Sent,
    AwaitingHeader,
    AwaitingBody,
    Complete,
    Failed,
}

/// Exclusive access to the transport, handed out by [`BridgeSession::lock`]
pub struct Link<T> {
    transport: T,
    config: BridgeConfig,
    tx: Vec<u8>,
    rx: Vec<u8>,
    state: ExchangeState,
}

impl<T: Transport> Link<T> {
    fn new(transport: T, config: BridgeConfig) -> Self {
        Self {
            transport,
            config,
            tx: Vec::with_capacity(encoded_request_len(COMMAND_DATA_SIZE)),
            rx: Vec::with_capacity(MAX_ANSWER_FRAME),
            state: ExchangeState::Idle,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Send a request and wait for its answer
    pub fn transact(&mut self, tag: CommandTag, arg: u8, payload: &[u8]) -> Result<Answer> {
        let retry_limit = self.config.retry_limit;
        self.transact_within(tag, arg, payload, retry_limit)
    }

    /// [`Link::transact`] with a custom header read budget
    pub fn transact_within(&mut self, tag: CommandTag, arg: u8, payload: &[u8], retry_limit: u32) -> Result<Answer> {
        let result = self.send(tag, arg, payload).and_then(|_| self.receive(tag, retry_limit));
        self.settle(tag, result)
    }

    /// Send a register write, waiting for the acknowledgement only when enabled
    pub fn post(&mut self, tag: CommandTag, arg: u8, payload: &[u8]) -> Result<()> {
        if self.config.write_acks {
            self.transact(tag, arg, payload)?.ensure_ok()?;
            return Ok(());
        }
        let result = self.send(tag, arg, payload);
        self.settle(tag, result)
    }

    fn settle<R>(&mut self, tag: CommandTag, result: Result<R>) -> Result<R> {
        match &result {
            Ok(_) => {
                self.set_state(ExchangeState::Complete);
                self.set_state(ExchangeState::Idle);
            }
            Err(e) => {
                log::error!("'{}' failed: {}", tag.as_char(), e);
                let stale = leaves_input(e);
                self.set_state(ExchangeState::Failed);
                if stale {
                    self.discard_input();
                }
                self.set_state(ExchangeState::Idle);
            }
        }
        result
    }

    /// Flush what is left of a failed answer so it cannot pair with the next request
    fn discard_input(&mut self) {
        match self.transport.discard_input() {
            Ok(0) => {}
            Ok(n) => log::warn!("discarded {} stale bytes", n),
            Err(e) => log::warn!("could not discard input: {}", e),
        }
    }

    fn set_state(&mut self, next: ExchangeState) {
        if self.state != next {
            log::trace!("exchange {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn send(&mut self, tag: CommandTag, arg: u8, payload: &[u8]) -> Result<()> {
        if payload.len() > COMMAND_DATA_SIZE {
            return Err(BridgeError::RequestTooLarge {
                len: payload.len(),
                limit: COMMAND_DATA_SIZE,
            });
        }

        let header = FrameHeader::new(tag.as_byte(), payload.len() as u16, arg);
        self.tx.clear();
        match self.config.encoding {
            WireEncoding::Binary => {
                self.tx.extend_from_slice(&header.to_bytes());
                self.tx.extend_from_slice(payload);
            }
            WireEncoding::AsciiHex => {
                self.tx.resize(encoded_request_len(payload.len()), 0);
                encode_request(&header, payload, &mut self.tx)?;
            }
        }

        self.transport.write_all(&self.tx)?;
        self.transport.flush()?;
        log::debug!("-> '{}' len={} arg={:#04x}", tag.as_char(), payload.len(), arg);
        self.set_state(ExchangeState::Sent);
        Ok(())
    }

    fn receive(&mut self, expected: CommandTag, retry_limit: u32) -> Result<Answer> {
        self.set_state(ExchangeState::AwaitingHeader);
        let header = self.read_header(retry_limit)?;

        let len = header.payload_len();
        if len > ANSWER_DATA_SIZE {
            return Err(BridgeError::MalformedSize {
                len,
                capacity: ANSWER_DATA_SIZE,
            });
        }

        self.set_state(ExchangeState::AwaitingBody);
        thread::sleep(self.config.settle_per_byte * (len as u32 + 1));
        let body_len = if self.config.usb_padding {
            padded_body_len(len)
        } else {
            len
        };
        self.read_body(body_len)?;

        log::debug!("<- '{}' len={} status={}", header.tag as char, len, header.status());
        if header.tag == UNSUPPORTED_TAG {
            return Err(BridgeError::Unsupported(expected.as_char()));
        }
        if header.tag != expected.as_byte() {
            return Err(BridgeError::UnexpectedAnswer {
                expected: expected.as_char(),
                got: header.tag,
            });
        }

        Ok(Answer {
            tag: header.tag,
            status: header.status(),
            data: self.rx[..len].to_vec(),
        })
    }

    /// Collect a header, discarding noise, within `retry_limit` reads
    fn read_header(&mut self, retry_limit: u32) -> Result<FrameHeader> {
        let mut sync = HeaderSync::new(is_answer_start);
        let mut buf = [0u8; HEADER_SIZE];

        for _ in 0..retry_limit {
            // Never read past the header
            let wanted = sync.missing();
            let n = read_some(&mut self.transport, &mut buf[..wanted])?;
            for &byte in &buf[..n] {
                if let Some(header) = sync.push(byte) {
                    if sync.discarded() > 0 {
                        log::warn!("skipped {} bytes before answer header", sync.discarded());
                    }
                    return Ok(header);
                }
            }
        }

        Err(BridgeError::Deadlock(retry_limit))
    }

    fn read_body(&mut self, body_len: usize) -> Result<()> {
        self.rx.clear();
        self.rx.resize(body_len, 0);

        let mut filled = 0;
        let mut stalls = 0;
        while filled < body_len {
            let n = read_some(&mut self.transport, &mut self.rx[filled..])?;
            if n == 0 {
                stalls += 1;
                if stalls >= self.config.retry_limit {
                    return Err(BridgeError::BodyTimeout {
                        received: filled,
                        expected: body_len,
                    });
                }
            }
            filled += n;
        }
        Ok(())
    }
}

/// Failures that can leave part of an answer unread
fn leaves_input(error: &BridgeError) -> bool {
    matches!(
        error,
        BridgeError::Deadlock(_)
            | BridgeError::BodyTimeout { .. }
            | BridgeError::MalformedSize { .. }
            | BridgeError::Transport(_)
    )
}

/// One read; a timeout counts as an empty read
fn read_some<R: Read + ?Sized>(transport: &mut R, buf: &mut [u8]) -> Result<usize> {
    match transport.read(buf) {
        Ok(n) => Ok(n),
        Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Shared handle to a bridge device
///
/// Every operation, including all chunks of a burst, runs under one lock
/// acquisition so concurrent callers never interleave on the wire.
pub struct BridgeSession<T: Transport> {
    link: Mutex<Link<T>>,
    config: BridgeConfig,
}

impl<T: Transport> BridgeSession<T> {
    pub fn new(transport: T, config: BridgeConfig) -> Self {
        let config = config.normalised();
        Self {
            link: Mutex::new(Link::new(transport, config)),
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Take exclusive use of the transport
    pub fn lock(&self) -> Result<MutexGuard<'_, Link<T>>> {
        self.link.lock().map_err(|_| BridgeError::Poisoned)
    }

    /// Send one request and wait for its answer
    pub fn command(&self, tag: CommandTag, arg: u8, payload: &[u8]) -> Result<Answer> {
        self.lock()?.transact(tag, arg, payload)
    }

    /// Close the session and hand back the transport
    pub fn into_transport(self) -> Result<T> {
        self.link
            .into_inner()
            .map(|link| link.transport)
            .map_err(|_| BridgeError::Poisoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{fast_config, ScriptedTransport};
    use lgw_bridge::config::protocol::ACK_KO;

    fn session(transport: ScriptedTransport) -> BridgeSession<ScriptedTransport> {
        BridgeSession::new(transport, fast_config())
    }

    #[test]
    fn test_read_register_exchange() {
        let mut port = ScriptedTransport::new();
        port.answer(&[b'r', 0, 1, ACK_OK, 0x42]);
        let session = session(port);

        let answer = session.command(CommandTag::ReadRegister, 0x55, &[0]).unwrap();
        assert_eq!(answer.data, vec![0x42]);
        assert!(answer.is_ok());

        let link = session.lock().unwrap();
        assert_eq!(link.transport().written(), &[b'r', 0, 1, 0x55, 0]);
        assert_eq!(link.state(), ExchangeState::Idle);
    }

    #[test]
    fn test_resync_skips_noise() {
        let mut port = ScriptedTransport::new();
        port.answer(&[0x00, 0xFF, b'\n', b'0']);
        port.answer(&[b'q', 0, 4, ACK_OK, 0, 0, 1, 0]);
        let session = session(port);

        let answer = session.command(CommandTag::TriggerCount, 0, &[0]).unwrap();
        assert_eq!(answer.data, vec![0, 0, 1, 0]);
    }

    #[test]
    fn test_partial_reads_and_timeouts_are_tolerated() {
        let mut port = ScriptedTransport::new();
        for &byte in &[b'p', 0, 3, ACK_OK] {
            port.answer(&[byte]);
        }
        port.stall();
        port.answer(&[7]);
        port.stall();
        port.answer(&[8, 9]);
        let session = session(port);

        let answer = session.command(CommandTag::ReadBurstAtomic, 0x20, &[0, 3]).unwrap();
        assert_eq!(answer.data, vec![7, 8, 9]);
    }

    #[test]
    fn test_silent_device_is_deadlock() {
        let session = session(ScriptedTransport::new());

        let result = session.command(CommandTag::ReadRegister, 0x01, &[0]);
        assert!(matches!(result, Err(BridgeError::Deadlock(ANSWER_RETRY_LIMIT))));

        let link = session.lock().unwrap();
        // One more read finds the line quiet
        assert_eq!(link.transport().reads(), ANSWER_RETRY_LIMIT as usize + 1);
        assert_eq!(link.state(), ExchangeState::Idle);
    }

    #[test]
    fn test_late_answer_is_not_taken_by_next_request() {
        let mut port = ScriptedTransport::new();
        for _ in 0..ANSWER_RETRY_LIMIT {
            port.stall();
        }
        port.answer(&[b'r', 0, 1, ACK_OK, 0x11]);
        port.stall();
        port.answer(&[b'r', 0, 1, ACK_OK, 0x22]);
        let session = session(port);

        assert!(matches!(
            session.command(CommandTag::ReadRegister, 0x01, &[0]),
            Err(BridgeError::Deadlock(_))
        ));
        let answer = session.command(CommandTag::ReadRegister, 0x02, &[0]).unwrap();
        assert_eq!(answer.data, vec![0x22]);
    }

    #[test]
    fn test_body_of_malformed_answer_is_discarded() {
        let mut port = ScriptedTransport::new();
        port.answer(&[b'p', 0x07, 0x00, ACK_OK]);
        port.answer(&[0x99; 64]);
        port.stall();
        port.answer(&[b'r', 0, 1, ACK_OK, 0x22]);
        let session = session(port);

        assert!(matches!(
            session.command(CommandTag::ReadBurstAtomic, 0x20, &[0, 4]),
            Err(BridgeError::MalformedSize { len: 0x0700, .. })
        ));
        let answer = session.command(CommandTag::ReadRegister, 0x02, &[0]).unwrap();
        assert_eq!(answer.data, vec![0x22]);
        assert_eq!(session.lock().unwrap().state(), ExchangeState::Idle);
    }

    #[test]
    fn test_rest_of_stalled_body_is_discarded() {
        let mut port = ScriptedTransport::new();
        port.answer(&[b'p', 0, 4, ACK_OK, 1, 2]);
        for _ in 0..ANSWER_RETRY_LIMIT {
            port.stall();
        }
        port.answer(&[3, 4]);
        port.stall();
        port.answer(&[b'r', 0, 1, ACK_OK, 0x22]);
        let session = session(port);

        assert!(matches!(
            session.command(CommandTag::ReadBurstAtomic, 0x20, &[0, 4]),
            Err(BridgeError::BodyTimeout { received: 2, .. })
        ));
        let answer = session.command(CommandTag::ReadRegister, 0x02, &[0]).unwrap();
        assert_eq!(answer.data, vec![0x22]);
    }

    #[test]
    fn test_noise_beyond_budget_is_deadlock() {
        let mut port = ScriptedTransport::new();
        port.answer(&[0xFF; 200]);
        let session = session(port);

        assert!(matches!(
            session.command(CommandTag::ReadRegister, 0x01, &[0]),
            Err(BridgeError::Deadlock(_))
        ));
    }

    #[test]
    fn test_stalled_body_times_out() {
        let mut port = ScriptedTransport::new();
        port.answer(&[b'p', 0, 4, ACK_OK, 1, 2]);
        let session = session(port);

        let result = session.command(CommandTag::ReadBurstAtomic, 0x20, &[0, 4]);
        assert!(matches!(
            result,
            Err(BridgeError::BodyTimeout {
                received: 2,
                expected: 4
            })
        ));
    }

    #[test]
    fn test_padding_byte_is_consumed() {
        let mut port = ScriptedTransport::new();
        let mut first = vec![b'p', 0, 60, ACK_OK];
        first.extend_from_slice(&[0xAB; 60]);
        first.push(0x00);
        port.answer(&first);
        port.answer(&[b'r', 0, 1, ACK_OK, 0x11]);
        let session = session(port);

        let answer = session.command(CommandTag::ReadBurstAtomic, 0x20, &[0, 60]).unwrap();
        assert_eq!(answer.data, vec![0xAB; 60]);

        // The pad byte must not leak into the next exchange
        let answer = session.command(CommandTag::ReadRegister, 0x01, &[0]).unwrap();
        assert_eq!(answer.data, vec![0x11]);
    }

    #[test]
    fn test_oversized_answer_is_malformed() {
        let mut port = ScriptedTransport::new();
        port.answer(&[b'p', 0xFF, 0xFF, ACK_OK]);
        let session = session(port);

        let result = session.command(CommandTag::ReadBurstAtomic, 0x20, &[0, 4]);
        assert!(matches!(
            result,
            Err(BridgeError::MalformedSize {
                len: 0xFFFF,
                capacity: ANSWER_DATA_SIZE
            })
        ));
    }

    #[test]
    fn test_unsupported_and_unexpected_answers() {
        let mut port = ScriptedTransport::new();
        port.answer(&[b'k', 0, 0, ACK_KO]);
        port.answer(&[b'q', 0, 0, ACK_OK]);
        let session = session(port);

        assert!(matches!(
            session.command(CommandTag::Bootloader, 0, &[0]),
            Err(BridgeError::Unsupported('n'))
        ));
        assert!(matches!(
            session.command(CommandTag::ReadRegister, 0, &[0]),
            Err(BridgeError::UnexpectedAnswer { expected: 'r', got: b'q' })
        ));
    }

    #[test]
    fn test_nack_status() {
        let mut port = ScriptedTransport::new();
        port.answer(&[b'm', 0, 0, ACK_KO]);
        let session = session(port);

        let answer = session.command(CommandTag::Reset, 0, &[0]).unwrap();
        assert!(matches!(answer.ensure_ok(), Err(BridgeError::Nack('m'))));
    }

    #[test]
    fn test_request_larger_than_device_buffer() {
        let session = session(ScriptedTransport::new());

        let result = session.command(CommandTag::WriteBurstAtomic, 0x20, &[0; COMMAND_DATA_SIZE + 1]);
        assert!(matches!(result, Err(BridgeError::RequestTooLarge { .. })));
        assert!(session.lock().unwrap().transport().written().is_empty());
    }

    #[test]
    fn test_ascii_hex_requests() {
        let mut port = ScriptedTransport::new();
        port.answer(&[b'r', 0, 1, ACK_OK, 0x7F]);
        let session = BridgeSession::new(
            port,
            BridgeConfig {
                encoding: WireEncoding::AsciiHex,
                ..fast_config()
            },
        );

        let answer = session.command(CommandTag::ReadRegister, 0x0A, &[0]).unwrap();
        assert_eq!(answer.data, vec![0x7F]);
        assert_eq!(session.lock().unwrap().transport().written(), b"r00010a00");
    }

    #[test]
    fn test_posted_write_waits_only_with_acks() {
        let session = session(ScriptedTransport::new());
        session.lock().unwrap().post(CommandTag::WriteRegister, 0x10, &[0x01]).unwrap();

        let mut port = ScriptedTransport::new();
        port.answer(&[b'w', 0, 0, ACK_KO]);
        let session = BridgeSession::new(
            port,
            BridgeConfig {
                write_acks: true,
                ..fast_config()
            },
        );
        assert!(matches!(
            session.lock().unwrap().post(CommandTag::WriteRegister, 0x10, &[0x01]),
            Err(BridgeError::Nack('w'))
        ));
    }

    #[test]
    fn test_chunk_sizes_are_clamped() {
        let session = BridgeSession::new(
            ScriptedTransport::new(),
            BridgeConfig {
                write_chunk: 4096,
                read_chunk: 0,
                ..fast_config()
            },
        );
        assert_eq!(session.config().write_chunk, COMMAND_DATA_SIZE);
        assert_eq!(session.config().read_chunk, 1);
    }
}
