//! Provider traits at the seams of the derivation pipeline. Every external
//! collaborator (L1 transport, blob backends, the message store, the header
//! oracle, the checkpoint store) enters through one of these.

use crate::errors::DeriveErrorKind;
use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use core::fmt::Display;
use mako_primitives::{
    blob::Blob,
    block::MissingHeaderFields,
    event::{L1BlockRef, RollupEvent},
    message::L1MessageTx,
    meta::DaProcessedBatchMeta,
};

/// The view of a commit transaction the decoder needs: its calldata and the
/// ordered blob hashes it references.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommitTransaction {
    /// The transaction hash.
    pub tx_hash: B256,
    /// The transaction calldata.
    pub input: Bytes,
    /// The ordered EIP-4844 versioned hashes, empty for non-blob commits.
    pub blob_versioned_hashes: Vec<B256>,
}

/// Read access to finalized L1 data: headers, rollup events and commit
/// transactions.
#[async_trait]
pub trait L1Provider {
    /// The provider's error, convertible into a severity-tagged pipeline
    /// error (transport failures map to temporary, malformed responses to
    /// critical).
    type Error: Display + Into<DeriveErrorKind> + Send + Sync;

    /// The latest finalized L1 block number.
    async fn finalized_block_number(&mut self) -> Result<u64, Self::Error>;

    /// A minimal reference to the L1 block at `number`.
    async fn block_ref_by_number(&mut self, number: u64) -> Result<L1BlockRef, Self::Error>;

    /// All rollup-contract events in `[from, to]`, in L1 order: ascending
    /// block number, then transaction index, then log index.
    async fn rollup_events(&mut self, from: u64, to: u64)
        -> Result<Vec<RollupEvent>, Self::Error>;

    /// The commit transaction `tx_hash`, known to be included in the block
    /// with hash `block_hash` (the fallback lookup path for unindexed
    /// transactions scans that block).
    async fn commit_transaction(
        &mut self,
        block_hash: B256,
        tx_hash: B256,
    ) -> Result<CommitTransaction, Self::Error>;
}

/// Fetches EIP-4844 blobs by versioned hash.
#[async_trait]
pub trait BlobProvider {
    /// The provider's error. Blob lookups that fail here are retried by the
    /// driver; integrity is checked by the decoder, not the provider.
    type Error: Display + Send + Sync;

    /// The blob referenced by `versioned_hash`, confirmed in the L1 block
    /// `block_ref` (beacon backends derive the slot from its timestamp).
    async fn blob(
        &mut self,
        block_ref: &L1BlockRef,
        versioned_hash: B256,
    ) -> Result<Box<Blob>, Self::Error>;
}

/// Read access to the collected L1→L2 message queue.
#[async_trait]
pub trait L1MessageProvider {
    /// The store's error.
    type Error: Display + Send + Sync;

    /// The message at `queue_index`, or `None` when the poller has not
    /// collected it yet. Absence is the pipeline's EOF signal, never an
    /// error.
    async fn message_by_queue_index(
        &self,
        queue_index: u64,
    ) -> Result<Option<L1MessageTx>, Self::Error>;
}

/// Supplies header fields that DA does not carry.
#[async_trait]
pub trait HeaderFieldOracle {
    /// The oracle's error.
    type Error: Display + Send + Sync;

    /// The missing fields for the L2 block at `number`.
    async fn missing_fields(&self, number: u64) -> Result<MissingHeaderFields, Self::Error>;
}

/// Durable storage for the derivation checkpoint.
pub trait CheckpointStore {
    /// The store's error.
    type Error: Display;

    /// The persisted checkpoint, or `None` before the first batch.
    fn processed_batch(&self) -> Result<Option<DaProcessedBatchMeta>, Self::Error>;

    /// Atomically replaces the persisted checkpoint.
    fn set_processed_batch(&mut self, meta: &DaProcessedBatchMeta) -> Result<(), Self::Error>;
}
