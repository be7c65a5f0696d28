//! Typed DA entries: the decoded artifacts the data source emits and the
//! queues operate on.

use alloy_consensus::TxEnvelope;
use alloy_primitives::{B256, U256};
use mako_primitives::{
    block::{BlockContext, L2Transaction, PartialBlock, PartialHeader},
    event::LogContext,
    message::{L1MessageTx, SkippedBitmap},
    meta::BlockRange,
    CodecVersion,
};

/// A decoded commit batch, complete up to the header fields an oracle
/// supplies at expansion time. This is the only entry kind that carries
/// blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    /// The codec version.
    pub version: CodecVersion,
    /// The batch index.
    pub index: u64,
    /// The batch hash carried by the commit event.
    pub batch_hash: B256,
    /// The parent batch's hash.
    pub parent_batch_hash: B256,
    /// Cumulative L1 messages popped before this batch.
    pub parent_total_l1_popped: u64,
    /// L1 messages popped by this batch, skipped included.
    pub l1_message_popped: u64,
    /// The skipped-message bitmap (empty for v7+).
    pub skipped_bitmap: SkippedBitmap,
    /// The batch blob's versioned hash; `None` for v0.
    pub blob_versioned_hash: Option<B256>,
    /// The decoded chunks. v7+ batches carry exactly one implicit chunk.
    pub chunks: Vec<Chunk>,
    /// The message-queue hash before this batch (zero before v7).
    pub prev_l1_queue_hash: B256,
    /// The message-queue hash after this batch (zero before v7).
    pub post_l1_queue_hash: B256,
    /// Where the commit event was emitted.
    pub ctx: LogContext,
}

/// A sub-grouping of blocks within a batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk's blocks, in L2 order.
    pub blocks: Vec<DaBlock>,
}

/// One block recovered from DA: its context, the L1 messages it consumes and
/// its L2 transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaBlock {
    /// The block context.
    pub context: BlockContext,
    /// The consumed L1 messages, in queue order.
    pub l1_messages: Vec<L1MessageTx>,
    /// The block's L2 transactions, in block order.
    pub transactions: Vec<TxEnvelope>,
}

impl CommitEntry {
    /// Cumulative L1 messages popped through this batch.
    pub const fn total_l1_popped(&self) -> u64 {
        self.parent_total_l1_popped + self.l1_message_popped
    }

    /// The batch's block range, or `None` for the empty genesis placeholder.
    pub fn block_range(&self) -> Option<BlockRange> {
        let first = self.chunks.iter().flat_map(|c| c.blocks.first()).next()?;
        let last = self.chunks.iter().rev().flat_map(|c| c.blocks.last()).next()?;
        Some(BlockRange { start: first.context.number, end: last.context.number })
    }

    /// Per-chunk block ranges, in chunk order.
    pub fn chunk_ranges(&self) -> Vec<BlockRange> {
        self.chunks
            .iter()
            .filter_map(|c| {
                Some(BlockRange {
                    start: c.blocks.first()?.context.number,
                    end: c.blocks.last()?.context.number,
                })
            })
            .collect()
    }

    /// Expands the batch into its partial blocks, attaching the supplied
    /// missing header fields per block. `fields` must be keyed in the same
    /// order blocks appear; the caller resolves them through its oracle.
    pub fn blocks_with_fields(
        &self,
        fields: impl Fn(u64) -> mako_primitives::block::MissingHeaderFields,
    ) -> Vec<PartialBlock> {
        let mut out = Vec::new();
        for chunk in &self.chunks {
            for block in &chunk.blocks {
                let mut transactions: Vec<L2Transaction> = Vec::with_capacity(
                    block.l1_messages.len() + block.transactions.len(),
                );
                transactions.extend(block.l1_messages.iter().cloned().map(L2Transaction::L1Message));
                transactions.extend(block.transactions.iter().cloned().map(L2Transaction::Enveloped));

                let header = if self.version.has_full_blob_payload() {
                    PartialHeader {
                        number: block.context.number,
                        timestamp: block.context.timestamp,
                        base_fee: Some(block.context.base_fee),
                        gas_limit: block.context.gas_limit,
                        // Constant since DA stopped carrying them.
                        difficulty: U256::from(1u64),
                        extra_data: Default::default(),
                        coinbase: Default::default(),
                        nonce: 0,
                        state_root: None,
                    }
                } else {
                    let missing = fields(block.context.number);
                    let historical = missing.historical.unwrap_or_default();
                    PartialHeader {
                        number: block.context.number,
                        timestamp: block.context.timestamp,
                        base_fee: self
                            .version
                            .uses_blob()
                            .then_some(block.context.base_fee),
                        gas_limit: block.context.gas_limit,
                        difficulty: missing.difficulty,
                        extra_data: missing.extra_data,
                        coinbase: historical.coinbase,
                        nonce: historical.nonce,
                        state_root: missing
                            .historical
                            .map(|h| h.state_root),
                    }
                };
                out.push(PartialBlock {
                    header,
                    transactions,
                    batch_index: self.index,
                });
            }
        }
        out
    }
}

/// A typed DA entry, in the order L1 produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaEntry {
    /// A decoded commit batch.
    Commit(Box<CommitEntry>),
    /// A single-batch revert (codec v0–v6).
    Revert {
        /// The reverted batch index.
        index: u64,
        /// Where the revert event was emitted.
        ctx: LogContext,
    },
    /// A range revert (codec v7+), both ends inclusive.
    RevertRange {
        /// First reverted index.
        start: u64,
        /// Last reverted index.
        finish: u64,
        /// Where the revert event was emitted.
        ctx: LogContext,
    },
    /// A finalize event; under bundling, `index` closes a contiguous range.
    Finalize {
        /// The last finalized batch index.
        index: u64,
        /// The finalized batch hash.
        batch_hash: B256,
        /// The finalized state root.
        state_root: B256,
        /// The finalized withdraw trie root.
        withdraw_root: B256,
        /// Where the finalize event was emitted.
        ctx: LogContext,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{commit_entry_with_blocks, test_l1_message};
    use mako_primitives::block::MissingHeaderFields;

    #[test]
    fn test_block_range() {
        let entry = commit_entry_with_blocks(1, CodecVersion::new(0), &[&[1, 2], &[3]]);
        assert_eq!(entry.block_range(), Some(BlockRange { start: 1, end: 3 }));
        assert_eq!(
            entry.chunk_ranges(),
            vec![BlockRange { start: 1, end: 2 }, BlockRange { start: 3, end: 3 }]
        );
    }

    #[test]
    fn test_empty_entry_has_no_range() {
        let entry = commit_entry_with_blocks(0, CodecVersion::new(0), &[]);
        assert_eq!(entry.block_range(), None);
        assert!(entry.blocks_with_fields(|_| Default::default()).is_empty());
    }

    #[test]
    fn test_expansion_orders_l1_messages_first() {
        let mut entry = commit_entry_with_blocks(5, CodecVersion::new(0), &[&[7]]);
        entry.chunks[0].blocks[0].l1_messages.push(test_l1_message(0));
        entry.chunks[0].blocks[0].context.num_transactions += 1;
        entry.chunks[0].blocks[0].context.num_l1_messages += 1;

        let blocks = entry.blocks_with_fields(|_| MissingHeaderFields {
            difficulty: U256::from(2u64),
            ..Default::default()
        });
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].number(), 7);
        assert_eq!(blocks[0].batch_index, 5);
        assert_eq!(blocks[0].header.difficulty, U256::from(2u64));
        assert!(blocks[0].header.base_fee.is_none());
        assert!(blocks[0].transactions[0].is_l1_message());
    }

    #[test]
    fn test_expansion_constants_for_full_blob_payload() {
        let entry = commit_entry_with_blocks(9, CodecVersion::new(7), &[&[100]]);
        let blocks = entry.blocks_with_fields(|_| panic!("oracle must not be consulted"));
        assert_eq!(blocks[0].header.difficulty, U256::from(1u64));
        assert!(blocks[0].header.base_fee.is_some());
    }
}
