//! Driver-side seams: the derivation pipeline abstraction the syncing loop
//! steps, and read access to the locally executed chain for the verifier.

use async_trait::async_trait;
use core::fmt::Display;
use mako_derive::{
    errors::DeriveResult,
    pipeline::DerivationPipeline,
    traits::{BlobProvider, CheckpointStore, HeaderFieldOracle, L1MessageProvider, L1Provider},
};
use mako_primitives::{batch::BlockDigest, block::PartialBlock, meta::DaProcessedBatchMeta};

/// What the syncing driver needs from a derivation pipeline.
#[async_trait]
pub trait BlockSource {
    /// The next derived block, in strict ascending order.
    async fn next_block(&mut self) -> DeriveResult<PartialBlock>;

    /// Rewinds the persisted L1 cursor by `blocks` and restarts derivation.
    fn rewind(&mut self, blocks: u64) -> DeriveResult<()>;

    /// The current checkpoint, for progress reporting.
    fn checkpoint(&self) -> DaProcessedBatchMeta;

    /// The L1 scan cursor, for progress reporting.
    fn l1_cursor(&self) -> u64;
}

#[async_trait]
impl<P, B, M, S, O> BlockSource for DerivationPipeline<P, B, M, S, O>
where
    P: L1Provider + Send + Sync,
    B: BlobProvider + Send + Sync,
    M: L1MessageProvider + Send + Sync,
    S: CheckpointStore + Send + Sync,
    O: HeaderFieldOracle + Send + Sync,
{
    async fn next_block(&mut self) -> DeriveResult<PartialBlock> {
        Self::next_block(self).await
    }

    fn rewind(&mut self, blocks: u64) -> DeriveResult<()> {
        Self::rewind(self, blocks)
    }

    fn checkpoint(&self) -> DaProcessedBatchMeta {
        *Self::checkpoint(self)
    }

    fn l1_cursor(&self) -> u64 {
        Self::l1_cursor(self)
    }
}

/// Read access to the locally executed L2 chain, consumed by the verifier
/// to rebuild batch commitments.
#[async_trait]
pub trait L2ChainProvider {
    /// The provider's error.
    type Error: Display + Send + Sync;

    /// The local head number.
    async fn head_number(&self) -> Result<u64, Self::Error>;

    /// The canonical block at `number`, reduced to its commitment inputs:
    /// context, transaction hashes and post-state roots.
    async fn block_digest(&self, number: u64) -> Result<BlockDigest, Self::Error>;
}
