//! An L1 reader over an alloy JSON-RPC provider: finalized head, headers,
//! rollup-contract logs, commit transactions and contract view calls.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_provider::{Provider, ReqwestProvider};
use alloy_rpc_types::{BlockNumberOrTag, BlockTransactionsKind, Filter, TransactionRequest};
use alloy_sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use lru::LruCache;
use mako_derive::{
    errors::{DeriveError, DeriveErrorKind},
    traits::{CommitTransaction, L1Provider},
};
use mako_primitives::{
    contract::{revert_range, revert_single, IRollup},
    event::{EventDecodeError, L1BlockRef, LogContext, RollupEvent},
};
use std::num::NonZeroUsize;
use tracing::{debug, warn};

const CACHE_SIZE: usize = 16;

/// Blocks covered per `eth_getLogs` window when scanning a long range.
pub const DEFAULT_LOG_SCAN_STRIDE: u64 = 100;

/// An error for the [AlloyL1Reader].
#[derive(Debug, thiserror::Error)]
pub enum L1ReaderError {
    /// The RPC transport failed; retryable.
    #[error("transport error: {0}")]
    Transport(String),
    /// A block the chain must have was not returned.
    #[error("missing block {0}")]
    MissingBlock(u64),
    /// A transaction referenced by a log could not be found, even by
    /// scanning its block.
    #[error("missing transaction {0}")]
    MissingTransaction(B256),
    /// A log is missing its inclusion metadata.
    #[error("log without inclusion context from block {0:?}")]
    PendingLog(Option<u64>),
    /// A rollup log failed event decoding.
    #[error(transparent)]
    Event(#[from] EventDecodeError),
    /// A view call returned malformed data.
    #[error("malformed {method} return data")]
    MalformedReturn {
        /// The view method.
        method: &'static str,
    },
}

impl From<L1ReaderError> for DeriveErrorKind {
    fn from(e: L1ReaderError) -> Self {
        match e {
            L1ReaderError::Transport(msg) => DeriveError::Provider(msg).temp(),
            L1ReaderError::Event(err) => DeriveError::Event(err).crit(),
            other => DeriveError::Provider(other.to_string()).crit(),
        }
    }
}

/// A concrete L1 reader backed by an alloy [ReqwestProvider], restricted to
/// the rollup contract's address and event signatures.
#[derive(Debug)]
pub struct AlloyL1Reader {
    inner: ReqwestProvider,
    rollup_address: Address,
    block_ref_cache: LruCache<u64, L1BlockRef>,
    tx_cache: LruCache<B256, CommitTransaction>,
}

impl AlloyL1Reader {
    /// Creates a reader for the rollup contract at `rollup_address`.
    pub fn new(inner: ReqwestProvider, rollup_address: Address) -> Self {
        Self {
            inner,
            rollup_address,
            block_ref_cache: LruCache::new(NonZeroUsize::new(CACHE_SIZE).unwrap()),
            tx_cache: LruCache::new(NonZeroUsize::new(CACHE_SIZE).unwrap()),
        }
    }

    /// Creates a reader from an HTTP endpoint.
    pub fn new_http(url: reqwest::Url, rollup_address: Address) -> Self {
        Self::new(ReqwestProvider::new_http(url), rollup_address)
    }

    /// The four rollup event signatures the reader filters for.
    const fn event_signatures() -> [B256; 4] {
        [
            IRollup::CommitBatch::SIGNATURE_HASH,
            revert_single::RevertBatch::SIGNATURE_HASH,
            revert_range::RevertBatch::SIGNATURE_HASH,
            IRollup::FinalizeBatch::SIGNATURE_HASH,
        ]
    }

    async fn fetch_events(&mut self, from: u64, to: u64) -> Result<Vec<RollupEvent>, L1ReaderError> {
        let filter = Filter::new()
            .address(self.rollup_address)
            .event_signature(Self::event_signatures().to_vec())
            .from_block(from)
            .to_block(to);
        let logs = self
            .inner
            .get_logs(&filter)
            .await
            .map_err(|e| L1ReaderError::Transport(e.to_string()))?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            let ctx = LogContext {
                block_number: log.block_number.ok_or(L1ReaderError::PendingLog(None))?,
                block_hash: log
                    .block_hash
                    .ok_or(L1ReaderError::PendingLog(log.block_number))?,
                block_timestamp: log.block_timestamp.unwrap_or_default(),
                tx_hash: log
                    .transaction_hash
                    .ok_or(L1ReaderError::PendingLog(log.block_number))?,
                tx_index: log
                    .transaction_index
                    .ok_or(L1ReaderError::PendingLog(log.block_number))?,
                log_index: log.log_index.ok_or(L1ReaderError::PendingLog(log.block_number))?,
            };
            if let Some(event) = RollupEvent::decode_log(&log.inner, ctx)? {
                events.push(event);
            }
        }
        // The node returns logs in inclusion order already; sorting keeps
        // the ordering contract independent of the backend.
        events.sort_by_key(|e| (e.ctx().block_number, e.ctx().log_index));
        Ok(events)
    }

    /// Scans `[from, to]` in windows of `stride` blocks, feeding each event
    /// to `on_event` in L1 order. The scan stops early when `on_event`
    /// returns `false`; the number of the last fully scanned block is
    /// returned.
    pub async fn scan_rollup_events<F>(
        &mut self,
        from: u64,
        to: u64,
        stride: u64,
        mut on_event: F,
    ) -> Result<u64, L1ReaderError>
    where
        F: FnMut(RollupEvent) -> bool + Send,
    {
        let stride = stride.max(1);
        let mut window_start = from;
        while window_start <= to {
            let window_end = (window_start + stride - 1).min(to);
            for event in self.fetch_events(window_start, window_end).await? {
                if !on_event(event) {
                    debug!(target: "l1-reader", at = window_end, "event scan interrupted");
                    return Ok(window_end);
                }
            }
            window_start = window_end + 1;
        }
        Ok(to)
    }

    async fn view_call(&mut self, data: Vec<u8>) -> Result<Bytes, L1ReaderError> {
        let request = TransactionRequest::default()
            .to(self.rollup_address)
            .input(Bytes::from(data).into());
        self.inner
            .call(&request)
            .await
            .map_err(|e| L1ReaderError::Transport(e.to_string()))
    }

    /// The contract's next unfinalized L1-message queue index.
    pub async fn next_unfinalized_queue_index(&mut self) -> Result<u64, L1ReaderError> {
        let ret = self
            .view_call(IRollup::nextUnfinalizedQueueIndexCall {}.abi_encode())
            .await?;
        let decoded = IRollup::nextUnfinalizedQueueIndexCall::abi_decode_returns(&ret, true)
            .map_err(|_| L1ReaderError::MalformedReturn { method: "nextUnfinalizedQueueIndex" })?;
        u256_to_u64(decoded._0, "nextUnfinalizedQueueIndex")
    }

    /// The contract's highest finalized batch index.
    pub async fn last_finalized_batch_index(&mut self) -> Result<u64, L1ReaderError> {
        let ret = self
            .view_call(IRollup::lastFinalizedBatchIndexCall {}.abi_encode())
            .await?;
        let decoded = IRollup::lastFinalizedBatchIndexCall::abi_decode_returns(&ret, true)
            .map_err(|_| L1ReaderError::MalformedReturn { method: "lastFinalizedBatchIndex" })?;
        u256_to_u64(decoded._0, "lastFinalizedBatchIndex")
    }

    /// The finalized state root recorded for `batch_index`.
    pub async fn finalized_state_root(&mut self, batch_index: u64) -> Result<B256, L1ReaderError> {
        let ret = self
            .view_call(
                IRollup::finalizedStateRootsCall { batchIndex: U256::from(batch_index) }
                    .abi_encode(),
            )
            .await?;
        let decoded = IRollup::finalizedStateRootsCall::abi_decode_returns(&ret, true)
            .map_err(|_| L1ReaderError::MalformedReturn { method: "finalizedStateRoots" })?;
        Ok(decoded._0)
    }
}

fn u256_to_u64(value: U256, method: &'static str) -> Result<u64, L1ReaderError> {
    value.try_into().map_err(|_| L1ReaderError::MalformedReturn { method })
}

#[async_trait]
impl L1Provider for AlloyL1Reader {
    type Error = L1ReaderError;

    async fn finalized_block_number(&mut self) -> Result<u64, Self::Error> {
        let block = self
            .inner
            .get_block_by_number(BlockNumberOrTag::Finalized, BlockTransactionsKind::Hashes.into())
            .await
            .map_err(|e| L1ReaderError::Transport(e.to_string()))?
            .ok_or(L1ReaderError::MissingBlock(0))?;
        Ok(block.header.number)
    }

    async fn block_ref_by_number(&mut self, number: u64) -> Result<L1BlockRef, Self::Error> {
        if let Some(block_ref) = self.block_ref_cache.get(&number) {
            return Ok(*block_ref);
        }
        let block = self
            .inner
            .get_block_by_number(number.into(), BlockTransactionsKind::Hashes.into())
            .await
            .map_err(|e| L1ReaderError::Transport(e.to_string()))?
            .ok_or(L1ReaderError::MissingBlock(number))?;
        let block_ref = L1BlockRef {
            number,
            hash: block.header.hash,
            parent_hash: block.header.parent_hash,
            timestamp: block.header.timestamp,
        };
        self.block_ref_cache.put(number, block_ref);
        Ok(block_ref)
    }

    async fn rollup_events(&mut self, from: u64, to: u64) -> Result<Vec<RollupEvent>, Self::Error> {
        self.fetch_events(from, to).await
    }

    async fn commit_transaction(
        &mut self,
        block_hash: B256,
        tx_hash: B256,
    ) -> Result<CommitTransaction, Self::Error> {
        if let Some(tx) = self.tx_cache.get(&tx_hash) {
            return Ok(tx.clone());
        }

        let fetched = self
            .inner
            .get_transaction_by_hash(tx_hash)
            .await
            .map_err(|e| L1ReaderError::Transport(e.to_string()))?;

        let tx = match fetched {
            Some(tx) => CommitTransaction {
                tx_hash,
                input: tx.input,
                blob_versioned_hashes: tx.blob_versioned_hashes.unwrap_or_default(),
            },
            None => {
                // Unindexed transaction; scan the block the log named.
                warn!(
                    target: "l1-reader",
                    %tx_hash,
                    "transaction not indexed, scanning its block"
                );
                let block = self
                    .inner
                    .get_block_by_hash(block_hash, BlockTransactionsKind::Full)
                    .await
                    .map_err(|e| L1ReaderError::Transport(e.to_string()))?
                    .ok_or(L1ReaderError::MissingTransaction(tx_hash))?;
                let tx = block
                    .transactions
                    .into_transactions()
                    .find(|tx| tx.hash == tx_hash)
                    .ok_or(L1ReaderError::MissingTransaction(tx_hash))?;
                CommitTransaction {
                    tx_hash,
                    input: tx.input,
                    blob_versioned_hashes: tx.blob_versioned_hashes.unwrap_or_default(),
                }
            }
        };
        self.tx_cache.put(tx_hash, tx.clone());
        Ok(tx)
    }
}
