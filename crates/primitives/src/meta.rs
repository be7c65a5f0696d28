//! Metadata records persisted across restarts. All records are RLP values
//! in an opaque key-value store.

use alloy_primitives::{Bytes, B256};
use alloy_rlp::{RlpDecodable, RlpEncodable};

/// The derivation checkpoint: the last batch fully handed to the executor.
///
/// `l1_block_number` doubles as the L1 scan cursor: derivation resumes by
/// re-scanning from this block and dropping already-processed batches.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct DaProcessedBatchMeta {
    /// The last fully processed batch index.
    pub batch_index: u64,
    /// The L1 block at which that batch was committed.
    pub l1_block_number: u64,
    /// Cumulative L1 messages popped through that batch, skipped included.
    pub total_l1_messages_popped: u64,
}

/// A contiguous range of L2 block numbers, both ends inclusive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct BlockRange {
    /// First block of the range.
    pub start: u64,
    /// Last block of the range.
    pub end: u64,
}

/// Per-batch metadata recorded by the verifier at commit time; everything
/// finalize-time verification needs without re-reading L1.
#[derive(Debug, Default, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct CommittedBatchMeta {
    /// The codec version byte.
    pub version: u8,
    /// Per-chunk block ranges, in chunk order.
    pub block_ranges: Vec<BlockRange>,
    /// The message-queue hash after this batch (zero before v7).
    pub post_l1_queue_hash: B256,
    /// The batch blob's versioned hash (zero for v0).
    pub blob_versioned_hash: B256,
    /// The skipped L1-message bitmap bytes (empty for v7+).
    pub skipped_bitmap: Bytes,
    /// L1 messages popped by this batch, skipped included.
    pub l1_message_popped: u64,
    /// Cumulative L1 messages popped through this batch.
    pub total_l1_message_popped: u64,
}

/// Per-batch metadata recorded by the verifier once a batch passes
/// finalize-time verification.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct FinalizedBatchMeta {
    /// The verified batch hash.
    pub batch_hash: B256,
    /// Cumulative L1 messages popped through this batch.
    pub total_l1_message_popped: u64,
    /// The batch's final state root.
    pub state_root: B256,
    /// The batch's withdraw trie root.
    pub withdraw_root: B256,
}
