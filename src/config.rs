//! Protocol and board configuration constants for the concentrator bridge

/// Wire protocol constants shared by the host bridge and the device decoder
pub mod protocol {
    /// Header size in both directions: `[id][len_msb][len_lsb][address|status]`
    pub const HEADER_SIZE: usize = 4;

    /// Largest register write carried by one frame (host ATOMICTX)
    pub const WRITE_CHUNK_SIZE: usize = 600;

    /// Largest register read requested by one frame (host ATOMICRX)
    pub const READ_CHUNK_SIZE: usize = 900;

    /// Capacity of the device request buffer
    pub const COMMAND_DATA_SIZE: usize = WRITE_CHUNK_SIZE;

    /// Capacity of an answer payload: one FIFO page plus 16 packet metadata blocks
    pub const ANSWER_DATA_SIZE: usize = 1024 + 16 * 44;

    /// Largest complete answer frame, including a possible USB padding byte
    pub const MAX_ANSWER_FRAME: usize = HEADER_SIZE + ANSWER_DATA_SIZE + 1;

    /// USB full-speed bulk packet size
    ///
    /// When an answer fills an exact multiple of this, the USB stack adds
    /// one padding byte that the reader has to consume.
    pub const USB_PACKET_SIZE: usize = 64;

    /// Status byte for an accepted command
    pub const ACK_OK: u8 = 1;

    /// Status byte for a rejected command
    pub const ACK_KO: u8 = 0;

    /// Firmware version checked by the `l` command
    pub const FIRMWARE_VERSION: u32 = 0x010a_0006;

    /// Unique id reported by boards without a serial number
    pub const DEFAULT_UNIQUE_ID: [u8; 8] = *b"12345678";

    /// Sentinel appended to packet-receive answers by the strict variant
    pub const RECEIVE_TRAILER: [u8; 4] = [0x23, 0x04, 0x20, 0x09];
}

/// Packed structure sizes exchanged by the gateway-level commands
pub mod layout {
    /// Maximum packets returned by one receive command
    pub const RX_FIFO_PACKETS: usize = 16;

    /// Aligned metadata block preceding each received payload
    pub const RX_METADATA_SIZE: usize = 44;

    /// Offset of the little-endian payload size inside the metadata block
    pub const RX_SIZE_OFFSET: usize = 42;

    /// Aligned metadata block of a transmit request
    pub const TX_METADATA_SIZE: usize = 32;

    /// Radio payload capacity
    pub const MAX_PAYLOAD: usize = 256;

    pub const BOARD_CONF_SIZE: usize = 4;
    pub const RXRF_CONF_SIZE: usize = 20;
    pub const RXIF_CONF_SIZE: usize = 32;

    /// Entries in the TX gain table
    pub const TX_GAIN_LUT_SIZE: usize = 16;

    /// Gain table: 5 bytes per entry plus the entry count
    pub const TX_GAIN_CONF_SIZE: usize = TX_GAIN_LUT_SIZE * 5 + 1;
}

/// Host-side exchange tuning
pub mod host {
    /// Reads allowed while waiting for an answer header, or while a body stalls
    pub const ANSWER_RETRY_LIMIT: u32 = 15;

    /// Device fill time per answer byte before the body is read
    pub const SETTLE_NS_PER_BYTE: u64 = 6_000;

    /// Serial read timeout
    pub const READ_TIMEOUT_MS: u64 = 100;

    /// Header reads allowed for a send, which waits for TX-done on the device
    pub const SEND_RETRY_LIMIT: u32 =
        ANSWER_RETRY_LIMIT + (super::device::TX_DONE_TIMEOUT_MS as u64 / READ_TIMEOUT_MS) as u32;

    /// Reads spent flushing stale input after a failed exchange
    pub const DISCARD_READ_LIMIT: usize = 32;

    /// Number of `/dev/ttyACM*` nodes probed
    pub const PROBE_PORT_COUNT: u8 = 10;
}

/// Device-side timing
pub mod device {
    /// Upper bound on the wait for the TX-done interrupt after a send
    pub const TX_DONE_TIMEOUT_MS: u32 = 10_000;

    /// Poll interval of the TX-done flag
    pub const TX_DONE_POLL_US: u32 = 1_000;
}

/// Serial configuration
pub mod serial {
    /// UART data link (TX GPIO17, RX GPIO18)
    pub const BAUD_RATE: u32 = 115_200;
}

/// SX1308 SPI bus (SCLK GPIO12, MISO GPIO13, MOSI GPIO11, NSS GPIO10, RESET GPIO9)
///
/// TX-done interrupt on GPIO14.
pub mod spi {
    pub const FREQUENCY_MHZ: u32 = 8;
}
