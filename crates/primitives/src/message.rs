//! Cross-layer L1→L2 messages and the hashes derived from them.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{RlpDecodable, RlpEncodable};

/// A transaction queued on L1 for execution on L2, identified by its
/// monotonic queue index.
#[derive(Debug, Default, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct L1MessageTx {
    /// The dense, monotonic queue index.
    pub queue_index: u64,
    /// The gas limit for L2 execution.
    pub gas_limit: u64,
    /// The L2 target address.
    pub to: Address,
    /// The value transferred.
    pub value: U256,
    /// The call data.
    pub data: Bytes,
    /// The L1 sender.
    pub sender: Address,
}

impl L1MessageTx {
    /// The message's transaction hash, `keccak256` of its RLP encoding.
    pub fn tx_hash(&self) -> B256 {
        keccak256(alloy_rlp::encode(self))
    }
}

/// Extends a rolling L1-message-queue hash with one consumed message.
///
/// The accumulator is `H_{i+1} = keccak256(H_i || tx_hash_i)` over every
/// message consumed, in queue-index order.
pub fn roll_queue_hash(prev: B256, msg: &L1MessageTx) -> B256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(prev.as_slice());
    buf[32..].copy_from_slice(msg.tx_hash().as_slice());
    keccak256(buf)
}

/// Errors produced while reading a skipped-message bitmap.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BitmapError {
    /// The bitmap is not a whole number of 32-byte words.
    #[error("skipped bitmap length {0} is not a multiple of 32")]
    InvalidLength(usize),
    /// A queried offset lies beyond the bitmap.
    #[error("bitmap offset {offset} out of range for {words} words")]
    OutOfRange {
        /// The queried bit offset.
        offset: u64,
        /// The number of 32-byte words in the bitmap.
        words: usize,
    },
}

/// The per-batch bitmap of deliberately skipped L1-message queue indices
/// (codec v0–v6).
///
/// The bitmap is a sequence of 32-byte big-endian words, one per 256 queue
/// indices of the batch's range. Bit `k` of the range is bit `k % 256`
/// (LSB-first) of word `k / 256`; a set bit marks a skipped index.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SkippedBitmap(Bytes);

impl SkippedBitmap {
    /// Wraps raw bitmap bytes, validating the word alignment.
    pub fn new(bytes: Bytes) -> Result<Self, BitmapError> {
        if bytes.len() % 32 != 0 {
            return Err(BitmapError::InvalidLength(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// An empty bitmap: no index is skipped.
    pub const fn empty() -> Self {
        Self(Bytes::new())
    }

    /// The raw bitmap bytes.
    pub const fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Whether the message at `offset` within the batch's range is skipped.
    /// Offsets beyond the bitmap are an error except for the empty bitmap,
    /// which skips nothing.
    pub fn is_skipped(&self, offset: u64) -> Result<bool, BitmapError> {
        if self.0.is_empty() {
            return Ok(false);
        }
        let word = (offset / 256) as usize;
        let words = self.0.len() / 32;
        if word >= words {
            return Err(BitmapError::OutOfRange { offset, words });
        }
        let bit = (offset % 256) as usize;
        // LSB-first within a big-endian word: bit 0 lives in the last byte.
        let byte = self.0[word * 32 + (31 - bit / 8)];
        Ok(byte & (1 << (bit % 8)) != 0)
    }
}
