//! Gateway-level commands handled by the bridge firmware.
//!
//! Configuration blobs are the packed structures the HAL builds; the bridge
//! only checks their size.

use lgw_bridge::config::host::SEND_RETRY_LIMIT;
use lgw_bridge::config::layout::{
    BOARD_CONF_SIZE, MAX_PAYLOAD, RXIF_CONF_SIZE, RXRF_CONF_SIZE, RX_FIFO_PACKETS, RX_METADATA_SIZE, RX_SIZE_OFFSET,
    TX_GAIN_CONF_SIZE, TX_METADATA_SIZE,
};
use lgw_bridge::config::protocol::{COMMAND_DATA_SIZE, FIRMWARE_VERSION, RECEIVE_TRAILER};
use lgw_bridge::protocol::CommandTag;

use crate::error::{BridgeError, Result};
use crate::session::{Answer, BridgeSession};
use crate::transport::Transport;

/// One packet fetched from the concentrator FIFO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxPacket {
    /// Packed receive metadata
    pub metadata: [u8; RX_METADATA_SIZE],
    pub payload: Vec<u8>,
}

/// Split a receive answer into packets
///
/// Layout: `[count]` then `count` times `[metadata][payload]`, the payload size
/// being a little-endian `u16` inside the metadata.
pub fn parse_packets(data: &[u8]) -> Result<Vec<RxPacket>> {
    let (&count, mut rest) = data.split_first().ok_or(BridgeError::MalformedPackets("missing count"))?;
    if count as usize > RX_FIFO_PACKETS {
        return Err(BridgeError::MalformedPackets("too many packets"));
    }

    let mut packets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if rest.len() < RX_METADATA_SIZE {
            return Err(BridgeError::MalformedPackets("truncated metadata"));
        }
        let (meta, tail) = rest.split_at(RX_METADATA_SIZE);
        let size = u16::from_le_bytes([meta[RX_SIZE_OFFSET], meta[RX_SIZE_OFFSET + 1]]) as usize;
        if size > MAX_PAYLOAD || tail.len() < size {
            return Err(BridgeError::MalformedPackets("truncated payload"));
        }

        let mut metadata = [0u8; RX_METADATA_SIZE];
        metadata.copy_from_slice(meta);
        packets.push(RxPacket {
            metadata,
            payload: tail[..size].to_vec(),
        });
        rest = &tail[size..];
    }
    Ok(packets)
}

impl<T: Transport> BridgeSession<T> {
    /// Fetch up to `max_packets` received packets
    pub fn receive_packets(&self, max_packets: u8) -> Result<Vec<RxPacket>> {
        let answer = self.command(CommandTag::Receive, 0, &[max_packets])?.ensure_ok()?;
        let data = if self.config().receive_trailer {
            answer
                .data
                .strip_suffix(&RECEIVE_TRAILER)
                .ok_or(BridgeError::TrailerMismatch)?
        } else {
            answer.data.as_slice()
        };
        parse_packets(data)
    }

    pub fn rxrf_setconf(&self, rf_chain: u8, conf: &[u8; RXRF_CONF_SIZE]) -> Result<()> {
        self.command(CommandTag::RxRfSetConf, rf_chain, conf)?.ensure_ok()?;
        Ok(())
    }

    pub fn rxif_setconf(&self, if_chain: u8, conf: &[u8; RXIF_CONF_SIZE]) -> Result<()> {
        self.command(CommandTag::RxIfSetConf, if_chain, conf)?.ensure_ok()?;
        Ok(())
    }

    pub fn txgain_setconf(&self, lut: &[u8; TX_GAIN_CONF_SIZE]) -> Result<()> {
        self.command(CommandTag::TxGainSetConf, 0, lut)?.ensure_ok()?;
        Ok(())
    }

    pub fn board_setconf(&self, conf: &[u8; BOARD_CONF_SIZE]) -> Result<()> {
        self.command(CommandTag::BoardSetConf, 0, conf)?.ensure_ok()?;
        Ok(())
    }

    /// Send a packed TX request and wait until the device reports TX-done
    pub fn send_packet(&self, packet: &[u8]) -> Result<()> {
        if packet.len() < TX_METADATA_SIZE || packet.len() > COMMAND_DATA_SIZE {
            return Err(BridgeError::InvalidTxRequest(packet.len()));
        }
        self.lock()?
            .transact_within(CommandTag::Send, 0, packet, SEND_RETRY_LIMIT)?
            .ensure_ok()?;
        Ok(())
    }

    /// Concentrator counter latched on the last trigger
    pub fn trigger_count(&self) -> Result<u32> {
        let answer = self.command(CommandTag::TriggerCount, 0, &[0])?.ensure_ok()?;
        match answer.data.as_slice() {
            [a, b, c, d] => Ok(u32::from_be_bytes([*a, *b, *c, *d])),
            other => Err(BridgeError::LengthMismatch {
                expected: 4,
                got: other.len(),
            }),
        }
    }

    /// Apply radio calibration offsets `idx_start..idx_start + idx_nb`
    pub fn commit_radio_calibration(&self, idx_start: u8, idx_nb: u8) -> Result<()> {
        self.command(CommandTag::Calibration, 0, &[idx_start, idx_nb])?.ensure_ok()?;
        Ok(())
    }

    /// Check the firmware version and return the board unique id
    pub fn check_firmware_version(&self) -> Result<[u8; 8]> {
        let answer = self.command(CommandTag::FirmwareVersion, 0, &FIRMWARE_VERSION.to_be_bytes())?;
        let unique_id = unique_id_of(&answer)?;
        if !answer.is_ok() {
            return Err(BridgeError::FirmwareMismatch {
                expected: FIRMWARE_VERSION,
                unique_id,
            });
        }
        log::info!("firmware {:#010x}, unique id {:02x?}", FIRMWARE_VERSION, unique_id);
        Ok(unique_id)
    }

    /// Board unique id; fails like [`Self::check_firmware_version`] on a mismatch
    pub fn unique_id(&self) -> Result<[u8; 8]> {
        self.check_firmware_version()
    }

    /// Reset the concentrator; also clears a burst left open on the device
    pub fn reset(&self) -> Result<()> {
        self.command(CommandTag::Reset, 0, &[0])?.ensure_ok()?;
        Ok(())
    }

    /// Ask the board to jump to its bootloader
    pub fn enter_bootloader(&self) -> Result<()> {
        self.command(CommandTag::Bootloader, 0, &[0])?.ensure_ok()?;
        Ok(())
    }
}

fn unique_id_of(answer: &Answer) -> Result<[u8; 8]> {
    answer
        .data
        .as_slice()
        .try_into()
        .map_err(|_| BridgeError::LengthMismatch {
            expected: 8,
            got: answer.data.len(),
        })
}

#[cfg(test)]
mod tests {
    use lgw_bridge::config::protocol::{ACK_KO, ACK_OK};
    use lgw_bridge::dispatcher::DispatcherConfig;

    use super::*;
    use crate::session::BridgeConfig;
    use crate::transport::mock::{fast_config, LoopbackDevice, ScriptedTransport};

    fn loopback() -> BridgeSession<LoopbackDevice> {
        BridgeSession::new(LoopbackDevice::new(DispatcherConfig::default()), fast_config())
    }

    #[test]
    fn test_receive_packets() {
        let session = loopback();
        {
            let mut link = session.lock().unwrap();
            let radio = &mut link.transport_mut().concentrator;
            radio.queue_packet(b"hello");
            radio.queue_packet(&[0xEE; 200]);
        }

        let packets = session.receive_packets(16).unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].payload, b"hello");
        assert_eq!(packets[0].metadata[0], 5);
        assert_eq!(packets[1].payload, vec![0xEE; 200]);

        assert!(session.receive_packets(16).unwrap().is_empty());
    }

    #[test]
    fn test_receive_packets_with_trailer() {
        let session = BridgeSession::new(
            LoopbackDevice::new(DispatcherConfig {
                receive_trailer: true,
                ..DispatcherConfig::default()
            }),
            BridgeConfig {
                receive_trailer: true,
                ..fast_config()
            },
        );
        session.lock().unwrap().transport_mut().concentrator.queue_packet(&[1, 2, 3]);

        let packets = session.receive_packets(1).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload, vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_trailer() {
        let mut port = ScriptedTransport::new();
        port.answer(&[b'b', 0, 1, ACK_OK, 0]);
        let session = BridgeSession::new(
            port,
            BridgeConfig {
                receive_trailer: true,
                ..fast_config()
            },
        );

        assert!(matches!(session.receive_packets(4), Err(BridgeError::TrailerMismatch)));
    }

    #[test]
    fn test_parse_packets_rejects_truncation() {
        assert!(parse_packets(&[]).is_err());
        assert!(parse_packets(&[1, 0, 0]).is_err());

        let mut data = vec![1u8];
        let mut meta = [0u8; RX_METADATA_SIZE];
        meta[RX_SIZE_OFFSET] = 10;
        data.extend_from_slice(&meta);
        data.extend_from_slice(&[0; 4]);
        assert!(matches!(
            parse_packets(&data),
            Err(BridgeError::MalformedPackets("truncated payload"))
        ));

        assert_eq!(parse_packets(&[0]).unwrap(), vec![]);
    }

    #[test]
    fn test_configuration_commands() {
        let session = loopback();

        session.rxrf_setconf(1, &[0; RXRF_CONF_SIZE]).unwrap();
        session.rxif_setconf(7, &[0; RXIF_CONF_SIZE]).unwrap();
        session.txgain_setconf(&[0; TX_GAIN_CONF_SIZE]).unwrap();
        session.board_setconf(&[0; BOARD_CONF_SIZE]).unwrap();
        session.commit_radio_calibration(2, 5).unwrap();

        let link = session.lock().unwrap();
        let radio = &link.transport().concentrator;
        assert_eq!(
            radio.configs,
            vec![
                ('c', 1, RXRF_CONF_SIZE),
                ('d', 7, RXIF_CONF_SIZE),
                ('h', 0, TX_GAIN_CONF_SIZE),
                ('i', 0, BOARD_CONF_SIZE),
            ]
        );
        assert_eq!(radio.calibrations, vec![(2, 5)]);
    }

    #[test]
    fn test_send_packet() {
        let session = loopback();
        let mut packet = vec![0u8; TX_METADATA_SIZE];
        packet.extend_from_slice(b"payload");

        session.send_packet(&packet).unwrap();
        assert_eq!(session.lock().unwrap().transport().concentrator.sent, vec![packet]);

        assert!(matches!(
            session.send_packet(&[0; 4]),
            Err(BridgeError::InvalidTxRequest(4))
        ));
    }

    #[test]
    fn test_trigger_count_and_reset() {
        let session = loopback();

        assert_eq!(session.trigger_count().unwrap(), 0x0102_0304);
        session.reset().unwrap();
        assert_eq!(session.lock().unwrap().transport().concentrator.resets, 1);
    }

    #[test]
    fn test_firmware_check() {
        let session = loopback();
        assert_eq!(
            session.unique_id().unwrap(),
            [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7]
        );

        let mut port = ScriptedTransport::new();
        port.answer(&[b'l', 0, 8, ACK_KO, 0, 0, 1, 2, 3, 4, 5, 6]);
        let session = BridgeSession::new(port, fast_config());
        match session.check_firmware_version() {
            Err(BridgeError::FirmwareMismatch { expected, unique_id }) => {
                assert_eq!(expected, FIRMWARE_VERSION);
                assert_eq!(unique_id, [0, 0, 1, 2, 3, 4, 5, 6]);
            }
            other => panic!("Expected firmware mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_bootloader_not_available() {
        let session = loopback();
        assert!(matches!(session.enter_bootloader(), Err(BridgeError::Nack('n'))));
    }
}
