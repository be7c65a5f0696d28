//! Materializes released batches into individual L2 blocks.

use crate::{
    batch_queue::BatchQueue,
    errors::{DeriveError, DeriveResult},
    traits::{BlobProvider, CheckpointStore, HeaderFieldOracle, L1MessageProvider, L1Provider},
};
use alloy_primitives::map::HashMap;
use mako_primitives::block::{MissingHeaderFields, PartialBlock};
use std::collections::VecDeque;
use tracing::debug;

/// Holds the tail of blocks expanded from the most recently released batch
/// and yields them one by one in ascending L2 order.
#[derive(Debug)]
pub struct BlockQueue<P, B, M, S, O> {
    prev: BatchQueue<P, B, M, S>,
    oracle: O,
    blocks: VecDeque<PartialBlock>,
}

impl<P, B, M, S, O> BlockQueue<P, B, M, S, O>
where
    P: L1Provider + Send,
    B: BlobProvider + Send,
    M: L1MessageProvider + Send + Sync,
    S: CheckpointStore,
    O: HeaderFieldOracle,
{
    /// Creates a block queue over `prev`, completing headers through
    /// `oracle`.
    pub const fn new(prev: BatchQueue<P, B, M, S>, oracle: O) -> Self {
        Self { prev, oracle, blocks: VecDeque::new() }
    }

    /// The underlying batch queue.
    pub const fn batch_queue(&self) -> &BatchQueue<P, B, M, S> {
        &self.prev
    }

    /// Mutable access to the underlying batch queue, for resets.
    pub fn batch_queue_mut(&mut self) -> &mut BatchQueue<P, B, M, S> {
        &mut self.prev
    }

    /// Returns the next block, expanding the next released batch when the
    /// current tail is drained. Batches without blocks (the genesis
    /// placeholder) are passed over.
    pub async fn next_block(&mut self) -> DeriveResult<PartialBlock> {
        loop {
            if let Some(block) = self.blocks.pop_front() {
                return Ok(block);
            }

            let batch = self.prev.next_batch().await?;
            // Resolve oracle-backed header fields ahead of expansion; v7+
            // headers are constant-completed and skip the oracle.
            let mut fields: HashMap<u64, MissingHeaderFields> = HashMap::default();
            if !batch.version.has_full_blob_payload() {
                for chunk in &batch.chunks {
                    for block in &chunk.blocks {
                        let number = block.context.number;
                        let missing = self
                            .oracle
                            .missing_fields(number)
                            .await
                            .map_err(|e| DeriveError::Provider(e.to_string()).temp())?;
                        fields.insert(number, missing);
                    }
                }
            }
            let expanded =
                batch.blocks_with_fields(|number| fields.get(&number).cloned().unwrap_or_default());
            debug!(
                target: "block-queue",
                batch = batch.index,
                blocks = expanded.len(),
                "expanded batch"
            );
            self.blocks.extend(expanded);
        }
    }

    /// Discards the block tail; used together with a batch-queue reset.
    pub fn clear(&mut self) {
        self.blocks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        da_queue::DaQueue,
        source::DataSource,
        test_utils::{
            log_ctx, v0_commit_fixture, TestBlobProvider, TestCheckpointStore, TestHeaderOracle,
            TestL1Provider, TestMessageProvider,
        },
    };
    use alloy_primitives::{B256, U256};
    use mako_primitives::event::RollupEvent;

    #[tokio::test]
    async fn test_blocks_emerge_in_order_with_oracle_fields() {
        let fixture = v0_commit_fixture(1, 100, &[&[1, 2], &[3]]);
        let mut l1 = TestL1Provider { finalized: 120, ..Default::default() };
        l1.events.push(fixture.event.clone());
        l1.insert_tx(fixture.tx.clone());
        l1.events.push(RollupEvent::Finalize {
            index: 1,
            batch_hash: B256::with_last_byte(1),
            state_root: B256::with_last_byte(2),
            withdraw_root: B256::with_last_byte(3),
            ctx: log_ctx(110, 0xf0, 0),
        });

        let source =
            DataSource::new(l1, TestBlobProvider::default(), TestMessageProvider::default(), 1);
        let batch_queue = BatchQueue::new(
            DaQueue::new(source),
            TestCheckpointStore::default(),
            Default::default(),
        );
        let oracle = TestHeaderOracle {
            fields: MissingHeaderFields { difficulty: U256::from(2u64), ..Default::default() },
        };
        let mut queue = BlockQueue::new(batch_queue, oracle);

        for expected in 1..=3u64 {
            let block = queue.next_block().await.unwrap();
            assert_eq!(block.number(), expected);
            assert_eq!(block.batch_index, 1);
            assert_eq!(block.header.difficulty, U256::from(2u64));
            assert_eq!(block.transactions.len(), 1);
        }
        assert!(queue.next_block().await.unwrap_err().is_eof());
    }
}
