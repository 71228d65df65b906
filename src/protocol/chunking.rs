//! Burst chunking
//!
//! A register burst larger than one frame is split into chunks. The role of
//! each chunk tells the device when to assert chip-select, when to send the
//! leading address byte, and when to release the bus.
//!
//! For `N` bytes and a chunk limit `C` the plan is `ceil(N / C)` chunks: the
//! first `floor(N / C)` are `C` bytes long and a shorter remainder closes the
//! burst. A burst that fits in one chunk is sent as a single atomic chunk.

/// Position of a chunk inside a burst transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkRole {
    /// Select, address byte, data, deselect
    Atomic,
    /// Select, address byte, data
    First,
    /// Data only
    Middle,
    /// Data, deselect
    End,
}

/// One chunk of a burst: `data[offset..offset + len]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub role: ChunkRole,
    pub offset: usize,
    pub len: usize,
}

impl Chunk {
    /// Byte range of this chunk inside the burst buffer
    pub fn range(&self) -> core::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Iterator over the chunks of a burst
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    total: usize,
    limit: usize,
    offset: usize,
}

impl ChunkPlan {
    /// Plan a burst of `total` bytes with at most `limit` bytes per chunk
    ///
    /// A zero limit is treated as one byte per chunk.
    pub fn new(total: usize, limit: usize) -> Self {
        Self {
            total,
            limit: limit.max(1),
            offset: 0,
        }
    }

    /// Number of chunks the whole burst needs
    pub fn chunk_count(&self) -> usize {
        self.total.div_ceil(self.limit)
    }
}

impl Iterator for ChunkPlan {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let remaining = self.total - self.offset;
        if remaining == 0 {
            return None;
        }

        let first = self.offset == 0;
        let chunk = if remaining > self.limit {
            Chunk {
                role: if first { ChunkRole::First } else { ChunkRole::Middle },
                offset: self.offset,
                len: self.limit,
            }
        } else {
            Chunk {
                role: if first { ChunkRole::Atomic } else { ChunkRole::End },
                offset: self.offset,
                len: remaining,
            }
        };

        self.offset += chunk.len;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.total - self.offset).div_ceil(self.limit);
        (left, Some(left))
    }
}

impl ExactSizeIterator for ChunkPlan {}

/// Reasons a chunk is refused by [`BurstSequence`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceError {
    /// Middle or end chunk without a preceding first chunk
    NotOpen,
    /// New transaction started while a burst is still open
    AlreadyOpen,
    /// Continuation chunk addressed to a different register
    AddressChanged,
}

/// Tracks the open SPI transaction on the device so chunks are applied in order
///
/// The concentrator has a single chip-select, so at most one burst can be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BurstSequence {
    open: Option<u8>,
}

impl BurstSequence {
    pub const fn new() -> Self {
        Self { open: None }
    }

    /// Check a burst chunk for `address` and advance the state if it is accepted
    pub fn accept(&mut self, role: ChunkRole, address: u8) -> Result<(), SequenceError> {
        match (role, self.open) {
            (ChunkRole::Atomic, None) => Ok(()),
            (ChunkRole::First, None) => {
                self.open = Some(address);
                Ok(())
            }
            (ChunkRole::Atomic | ChunkRole::First, Some(_)) => Err(SequenceError::AlreadyOpen),
            (ChunkRole::Middle | ChunkRole::End, None) => Err(SequenceError::NotOpen),
            (ChunkRole::Middle | ChunkRole::End, Some(open)) if open != address => {
                Err(SequenceError::AddressChanged)
            }
            (ChunkRole::Middle, Some(_)) => Ok(()),
            (ChunkRole::End, Some(_)) => {
                self.open = None;
                Ok(())
            }
        }
    }

    /// Check a transaction that must not interleave with an open burst
    pub fn accept_standalone(&self) -> Result<(), SequenceError> {
        match self.open {
            Some(_) => Err(SequenceError::AlreadyOpen),
            None => Ok(()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn reset(&mut self) {
        self.open = None;
    }
}
