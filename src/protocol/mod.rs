pub mod chunking;
pub mod frame;
pub mod hex;
pub mod tag;

pub use chunking::{BurstSequence, Chunk, ChunkPlan, ChunkRole, SequenceError};
pub use frame::{padded_body_len, FrameHeader, HeaderSync};
pub use tag::{CommandTag, Direction, UNSUPPORTED_TAG};

/// Request encoding on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireEncoding {
    /// Raw header and payload bytes
    #[default]
    Binary,
    /// Tag followed by hex digit pairs
    AsciiHex,
}
