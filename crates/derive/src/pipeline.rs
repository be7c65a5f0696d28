//! Assembles the stage chain and fronts it with a single facade the driver
//! steps.

use crate::{
    batch_queue::BatchQueue,
    block_queue::BlockQueue,
    da_queue::DaQueue,
    errors::{DeriveError, DeriveResult},
    source::{DataSource, DEFAULT_SCAN_STRIDE},
    traits::{BlobProvider, CheckpointStore, HeaderFieldOracle, L1MessageProvider, L1Provider},
};
use mako_primitives::{block::PartialBlock, meta::DaProcessedBatchMeta};

/// Builds a [DerivationPipeline] from its providers.
#[derive(Debug)]
pub struct PipelineBuilder<P, B, M, S, O> {
    l1: P,
    blobs: B,
    messages: M,
    store: S,
    oracle: O,
    genesis_l1_block: u64,
    stride: u64,
    checkpoint_override: Option<DaProcessedBatchMeta>,
}

impl<P, B, M, S, O> PipelineBuilder<P, B, M, S, O>
where
    P: L1Provider + Send,
    B: BlobProvider + Send,
    M: L1MessageProvider + Send + Sync,
    S: CheckpointStore,
    O: HeaderFieldOracle,
{
    /// Starts a builder. `genesis_l1_block` anchors the very first scan when
    /// no checkpoint has ever been persisted (the rollup contract's deploy
    /// block is the natural choice).
    pub const fn new(l1: P, blobs: B, messages: M, store: S, oracle: O, genesis_l1_block: u64) -> Self {
        Self {
            l1,
            blobs,
            messages,
            store,
            oracle,
            genesis_l1_block,
            stride: DEFAULT_SCAN_STRIDE,
            checkpoint_override: None,
        }
    }

    /// Overrides the L1 scan stride.
    pub const fn with_stride(mut self, stride: u64) -> Self {
        self.stride = stride;
        self
    }

    /// Starts from an explicit checkpoint instead of the persisted one
    /// (recovery mode).
    pub const fn with_checkpoint(mut self, checkpoint: DaProcessedBatchMeta) -> Self {
        self.checkpoint_override = Some(checkpoint);
        self
    }

    /// Wires the stages together, resuming from the recovery override, the
    /// persisted checkpoint, or genesis, in that order of preference.
    pub fn build(self) -> DeriveResult<DerivationPipeline<P, B, M, S, O>> {
        let checkpoint = match self.checkpoint_override {
            Some(checkpoint) => checkpoint,
            None => self
                .store
                .processed_batch()
                .map_err(|e| DeriveError::Store(e.to_string()).crit())?
                .unwrap_or(DaProcessedBatchMeta {
                    batch_index: 0,
                    l1_block_number: self.genesis_l1_block,
                    total_l1_messages_popped: 0,
                }),
        };

        let source = DataSource::new(self.l1, self.blobs, self.messages, checkpoint.l1_block_number)
            .with_stride(self.stride);
        let da_queue = DaQueue::new(source);
        let batch_queue = BatchQueue::new(da_queue, self.store, checkpoint);
        let block_queue = BlockQueue::new(batch_queue, self.oracle);
        Ok(DerivationPipeline { block_queue })
    }
}

/// The assembled derivation pipeline: data source → DA queue → batch queue →
/// block queue, stepped from a single task.
#[derive(Debug)]
pub struct DerivationPipeline<P, B, M, S, O> {
    block_queue: BlockQueue<P, B, M, S, O>,
}

impl<P, B, M, S, O> DerivationPipeline<P, B, M, S, O>
where
    P: L1Provider + Send,
    B: BlobProvider + Send,
    M: L1MessageProvider + Send + Sync,
    S: CheckpointStore,
    O: HeaderFieldOracle,
{
    /// The next derived L2 block, in strict ascending order.
    pub async fn next_block(&mut self) -> DeriveResult<PartialBlock> {
        self.block_queue.next_block().await
    }

    /// Rewinds the persisted L1 cursor by `blocks` and restarts derivation
    /// from the rewound checkpoint.
    pub fn rewind(&mut self, blocks: u64) -> DeriveResult<()> {
        self.block_queue.clear();
        self.block_queue.batch_queue_mut().rewind(blocks)
    }

    /// The current in-memory checkpoint.
    pub const fn checkpoint(&self) -> &DaProcessedBatchMeta {
        self.block_queue.batch_queue().checkpoint()
    }

    /// The upstream L1 scan cursor.
    pub const fn l1_cursor(&self) -> u64 {
        self.block_queue.batch_queue().l1_cursor()
    }

    /// The finalize high-water mark.
    pub const fn last_finalized_batch_index(&self) -> u64 {
        self.block_queue.batch_queue().last_finalized_batch_index()
    }
}
