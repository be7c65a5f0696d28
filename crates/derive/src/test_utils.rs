//! Programmable test doubles and fixture builders for the pipeline stages.

use crate::{
    entries::{Chunk, CommitEntry, DaBlock},
    errors::{DeriveError, DeriveErrorKind},
    traits::{
        BlobProvider, CheckpointStore, CommitTransaction, HeaderFieldOracle, L1MessageProvider,
        L1Provider,
    },
};
use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_primitives::{map::HashMap, Address, Bytes, Signature, TxKind, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use mako_primitives::{
    batch::BatchHeader,
    blob::Blob,
    block::{BlockContext, MissingHeaderFields},
    contract::IRollup,
    event::{L1BlockRef, LogContext, RollupEvent},
    message::{L1MessageTx, SkippedBitmap},
    meta::DaProcessedBatchMeta,
    CodecVersion,
};
use std::sync::{Arc, Mutex};

/// A deterministic signed legacy transaction.
pub fn test_l2_tx(nonce: u64) -> TxEnvelope {
    let tx = TxLegacy {
        chain_id: Some(1),
        nonce,
        gas_price: 1_000_000_000,
        gas_limit: 21_000,
        to: TxKind::Call(Address::with_last_byte(0x42)),
        value: U256::from(nonce),
        input: Bytes::new(),
    };
    TxEnvelope::Legacy(tx.into_signed(Signature::test_signature()))
}

/// A deterministic L1 message.
pub fn test_l1_message(queue_index: u64) -> L1MessageTx {
    L1MessageTx {
        queue_index,
        gas_limit: 500_000,
        to: Address::with_last_byte(0x51),
        value: U256::ZERO,
        data: Bytes::from_static(b"\xca\xfe"),
        sender: Address::with_last_byte(0x52),
    }
}

/// A log context with distinguishable transaction and block identity.
pub fn log_ctx(block_number: u64, tx_tag: u8, log_index: u64) -> LogContext {
    LogContext {
        block_number,
        block_hash: B256::with_last_byte(block_number as u8),
        block_timestamp: 1_700_000_000 + block_number * 12,
        tx_hash: B256::with_last_byte(tx_tag),
        tx_index: tx_tag as u64,
        log_index,
    }
}

/// A commit event fixture.
pub fn commit_event(index: u64, batch_hash: B256, ctx: LogContext) -> RollupEvent {
    RollupEvent::Commit { index, batch_hash, ctx }
}

/// A block context with `count` transactions, `l1` of them messages.
pub fn block_context(number: u64, count: u16, l1: u16) -> BlockContext {
    BlockContext {
        number,
        timestamp: 1_000 + number,
        base_fee: U256::ZERO,
        gas_limit: 10_000_000,
        num_transactions: count,
        num_l1_messages: l1,
    }
}

/// A commit entry with empty blocks at the given numbers, one slice per
/// chunk.
pub fn commit_entry_with_blocks(
    index: u64,
    version: CodecVersion,
    chunks: &[&[u64]],
) -> CommitEntry {
    CommitEntry {
        version,
        index,
        batch_hash: B256::with_last_byte(index as u8),
        parent_batch_hash: B256::ZERO,
        parent_total_l1_popped: 0,
        l1_message_popped: 0,
        skipped_bitmap: SkippedBitmap::empty(),
        blob_versioned_hash: None,
        chunks: chunks
            .iter()
            .map(|numbers| Chunk {
                blocks: numbers
                    .iter()
                    .map(|&number| DaBlock {
                        context: block_context(number, 0, 0),
                        l1_messages: Vec::new(),
                        transactions: Vec::new(),
                    })
                    .collect(),
            })
            .collect(),
        prev_l1_queue_hash: B256::ZERO,
        post_l1_queue_hash: B256::ZERO,
        ctx: LogContext::default(),
    }
}

/// The error every test double returns.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TestProviderError(pub String);

impl From<TestProviderError> for DeriveErrorKind {
    fn from(e: TestProviderError) -> Self {
        DeriveError::Provider(e.0).temp()
    }
}

/// A programmable [L1Provider].
#[derive(Debug, Default, Clone)]
pub struct TestL1Provider {
    /// The finalized head returned to the source.
    pub finalized: u64,
    /// When set, finalized-head refreshes fail.
    pub fail_finalized: bool,
    /// All events, filtered per range query.
    pub events: Vec<RollupEvent>,
    /// Commit transactions by hash.
    pub txs: HashMap<B256, CommitTransaction>,
}

impl TestL1Provider {
    /// Registers a commit transaction.
    pub fn insert_tx(&mut self, tx: CommitTransaction) {
        self.txs.insert(tx.tx_hash, tx);
    }
}

#[async_trait]
impl L1Provider for TestL1Provider {
    type Error = TestProviderError;

    async fn finalized_block_number(&mut self) -> Result<u64, Self::Error> {
        if self.fail_finalized {
            return Err(TestProviderError("finalized head unavailable".into()));
        }
        Ok(self.finalized)
    }

    async fn block_ref_by_number(&mut self, number: u64) -> Result<L1BlockRef, Self::Error> {
        Ok(L1BlockRef {
            number,
            hash: B256::with_last_byte(number as u8),
            parent_hash: B256::with_last_byte(number.wrapping_sub(1) as u8),
            timestamp: 1_700_000_000 + number * 12,
        })
    }

    async fn rollup_events(&mut self, from: u64, to: u64) -> Result<Vec<RollupEvent>, Self::Error> {
        Ok(self
            .events
            .iter()
            .filter(|e| (from..=to).contains(&e.ctx().block_number))
            .cloned()
            .collect())
    }

    async fn commit_transaction(
        &mut self,
        _block_hash: B256,
        tx_hash: B256,
    ) -> Result<CommitTransaction, Self::Error> {
        self.txs
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| TestProviderError(format!("unknown transaction {tx_hash}")))
    }
}

/// A programmable [BlobProvider] backed by a map.
#[derive(Debug, Default, Clone)]
pub struct TestBlobProvider {
    /// Blobs by versioned hash.
    pub blobs: HashMap<B256, Box<Blob>>,
}

impl TestBlobProvider {
    /// Registers a blob under a versioned hash.
    pub fn insert(&mut self, versioned_hash: B256, blob: Box<Blob>) {
        self.blobs.insert(versioned_hash, blob);
    }
}

#[async_trait]
impl BlobProvider for TestBlobProvider {
    type Error = TestProviderError;

    async fn blob(
        &mut self,
        _block_ref: &L1BlockRef,
        versioned_hash: B256,
    ) -> Result<Box<Blob>, Self::Error> {
        self.blobs
            .get(&versioned_hash)
            .cloned()
            .ok_or_else(|| TestProviderError(format!("no blob for {versioned_hash}")))
    }
}

/// A programmable [L1MessageProvider]; absent indices surface as EOF.
#[derive(Debug, Default, Clone)]
pub struct TestMessageProvider {
    /// Messages by queue index.
    pub messages: Arc<Mutex<HashMap<u64, L1MessageTx>>>,
}

impl TestMessageProvider {
    /// Makes the messages at `indices` available.
    pub fn extend(&self, indices: impl IntoIterator<Item = u64>) {
        let mut messages = self.messages.lock().unwrap();
        for index in indices {
            messages.insert(index, test_l1_message(index));
        }
    }
}

#[async_trait]
impl L1MessageProvider for TestMessageProvider {
    type Error = TestProviderError;

    async fn message_by_queue_index(
        &self,
        queue_index: u64,
    ) -> Result<Option<L1MessageTx>, Self::Error> {
        Ok(self.messages.lock().unwrap().get(&queue_index).cloned())
    }
}

/// A [HeaderFieldOracle] returning a programmable constant.
#[derive(Debug, Default, Clone)]
pub struct TestHeaderOracle {
    /// The fields returned for every block.
    pub fields: MissingHeaderFields,
}

#[async_trait]
impl HeaderFieldOracle for TestHeaderOracle {
    type Error = TestProviderError;

    async fn missing_fields(&self, _number: u64) -> Result<MissingHeaderFields, Self::Error> {
        Ok(self.fields.clone())
    }
}

/// A [CheckpointStore] whose persisted value stays inspectable after the
/// store moves into the batch queue.
#[derive(Debug, Default, Clone)]
pub struct TestCheckpointStore {
    inner: Arc<Mutex<Option<DaProcessedBatchMeta>>>,
}

impl TestCheckpointStore {
    /// A handle observing the same persisted slot.
    pub fn handle(&self) -> Self {
        self.clone()
    }

    /// The currently persisted checkpoint.
    pub fn persisted(&self) -> Option<DaProcessedBatchMeta> {
        *self.inner.lock().unwrap()
    }
}

impl CheckpointStore for TestCheckpointStore {
    type Error = core::convert::Infallible;

    fn processed_batch(&self) -> Result<Option<DaProcessedBatchMeta>, Self::Error> {
        Ok(*self.inner.lock().unwrap())
    }

    fn set_processed_batch(&mut self, meta: &DaProcessedBatchMeta) -> Result<(), Self::Error> {
        *self.inner.lock().unwrap() = Some(*meta);
        Ok(())
    }
}

/// A multi-batch v7 commit fixture: the transaction, its ordered commit
/// events, and a blob provider holding the verified blobs.
#[derive(Debug, Clone)]
pub struct V7CommitFixture {
    /// The commit transaction.
    pub tx: CommitTransaction,
    /// The ordered commit events, consecutive from the first index.
    pub events: Vec<RollupEvent>,
    /// Blobs keyed by their real versioned hashes.
    pub blobs: TestBlobProvider,
}

/// Builds a `commitBatches` transaction carrying `count` v7 batches starting
/// at `first_index`, one single-block blob per batch and no L1 messages.
pub fn v7_commit_fixture(
    first_index: u64,
    count: u64,
    l1_block: u64,
    parent_hash: B256,
    first_block_number: u64,
) -> V7CommitFixture {
    use crate::codec::{encode_full_payload, FullPayload};
    use mako_primitives::{
        batch::full_blob_batch_hash,
        blob::{blob_to_versioned_hash, encode_envelope},
    };

    let mut blobs = TestBlobProvider::default();
    let mut events = Vec::with_capacity(count as usize);
    let mut blob_hashes = Vec::with_capacity(count as usize);
    let mut parent = parent_hash;
    let ctx = log_ctx(l1_block, first_index as u8, 0);

    for i in 0..count {
        let index = first_index + i;
        let number = first_block_number + i;
        let payload = FullPayload {
            prev_l1_queue_hash: B256::ZERO,
            post_l1_queue_hash: B256::ZERO,
            initial_l1_queue_index: 0,
            contexts: vec![BlockContext {
                number,
                timestamp: 2_000 + number,
                base_fee: U256::from(10u64),
                gas_limit: 30_000_000,
                num_transactions: 1,
                num_l1_messages: 0,
            }],
            txs_per_block: vec![vec![test_l2_tx(index)]],
        };
        let blob = encode_envelope(&encode_full_payload(&payload)).unwrap();
        let blob_hash = blob_to_versioned_hash(&blob).unwrap();
        blobs.insert(blob_hash, blob);
        blob_hashes.push(blob_hash);

        let batch_hash = full_blob_batch_hash(7, index, blob_hash, parent);
        events.push(commit_event(index, batch_hash, LogContext { log_index: i, ..ctx }));
        parent = batch_hash;
    }

    let input = IRollup::commitBatchesCall {
        version: 7,
        parentBatchHash: parent_hash,
        lastBatchHash: parent,
    }
    .abi_encode();
    let tx = CommitTransaction {
        tx_hash: ctx.tx_hash,
        input: input.into(),
        blob_versioned_hashes: blob_hashes,
    };
    V7CommitFixture { tx, events, blobs }
}

/// A complete v0 commit fixture: the calldata transaction, its commit event,
/// and the parent header it extends.
#[derive(Debug, Clone)]
pub struct V0CommitFixture {
    /// The commit transaction.
    pub tx: CommitTransaction,
    /// The commit event.
    pub event: RollupEvent,
    /// The parent batch header.
    pub parent: BatchHeader,
}

/// Builds a v0 commit for `index` at L1 block `l1_block`, with one L2
/// transaction per block and no L1 messages. `blocks_per_chunk` lists block
/// numbers chunk by chunk.
pub fn v0_commit_fixture(index: u64, l1_block: u64, blocks_per_chunk: &[&[u64]]) -> V0CommitFixture {
    let parent = BatchHeader { version: 0, index: index - 1, ..Default::default() };
    let mut nonce = 0u64;
    let chunks: Vec<Bytes> = blocks_per_chunk
        .iter()
        .map(|numbers| {
            let contexts: Vec<BlockContext> =
                numbers.iter().map(|&n| block_context(n, 1, 0)).collect();
            let txs: Vec<Vec<TxEnvelope>> = numbers
                .iter()
                .map(|_| {
                    nonce += 1;
                    vec![test_l2_tx(nonce)]
                })
                .collect();
            crate::codec::encode_chunk(CodecVersion::new(0), &contexts, &txs)
                .unwrap()
                .into()
        })
        .collect();

    let input = IRollup::commitBatchCall {
        version: 0,
        parentBatchHeader: parent.encode().into(),
        chunks,
        skippedL1MessageBitmap: Bytes::new(),
    }
    .abi_encode();

    let ctx = log_ctx(l1_block, index as u8, 0);
    let tx = CommitTransaction {
        tx_hash: ctx.tx_hash,
        input: input.into(),
        blob_versioned_hashes: Vec::new(),
    };
    V0CommitFixture {
        tx,
        event: commit_event(index, B256::with_last_byte(index as u8), ctx),
        parent,
    }
}
