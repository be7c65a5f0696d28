//! Persisted pipeline state: a synchronous key-value seam plus typed
//! accessors for the metadata records.

use alloy_primitives::map::HashMap;
use mako_derive::traits::CheckpointStore;
use mako_primitives::meta::{CommittedBatchMeta, DaProcessedBatchMeta, FinalizedBatchMeta};
use std::sync::{Arc, Mutex};

/// Describes the interface of a simple, synchronous key-value store.
pub trait KeyValueStore {
    /// Get the value associated with the given key.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Set the value associated with the given key.
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    /// Delete the value associated with the given key.
    fn delete(&mut self, key: &[u8]);
}

/// A key-value store held in memory, for tests and development.
#[derive(Debug, Default, Clone)]
pub struct MemoryKeyValueStore {
    store: HashMap<Vec<u8>, Vec<u8>>,
}

impl MemoryKeyValueStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.store.get(key).cloned()
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.store.insert(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.store.remove(key);
    }
}

/// An error from the typed store: a persisted record failed to decode.
#[derive(Debug, thiserror::Error)]
#[error("corrupt {record} record: {source}")]
pub struct StoreError {
    /// The record kind.
    pub record: &'static str,
    /// The RLP decoder's error.
    #[source]
    pub source: alloy_rlp::Error,
}

const PROCESSED_BATCH_KEY: &[u8] = b"da-processed-batch";
const COMMITTED_BATCH_PREFIX: &[u8] = b"committed-batch-";
const FINALIZED_BATCH_PREFIX: &[u8] = b"finalized-batch-";
const LAST_FINALIZED_INDEX_KEY: &[u8] = b"last-finalized-batch-index";
const FINALIZED_L2_BLOCK_KEY: &[u8] = b"finalized-l2-block-number";
const EVENT_SYNCED_L1_BLOCK_KEY: &[u8] = b"rollup-event-synced-l1-block";

fn indexed_key(prefix: &[u8], index: u64) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.extend_from_slice(&index.to_be_bytes());
    key
}

/// Typed accessors over a shared key-value store. Clones observe the same
/// underlying store; the inner mutex covers each read or write.
#[derive(Debug)]
pub struct RollupStore<KV> {
    inner: Arc<Mutex<KV>>,
}

impl<KV> Clone for RollupStore<KV> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<KV: KeyValueStore> RollupStore<KV> {
    /// Wraps a key-value backend.
    pub fn new(inner: KV) -> Self {
        Self { inner: Arc::new(Mutex::new(inner)) }
    }

    fn get_rlp<T: alloy_rlp::Decodable>(
        &self,
        key: &[u8],
        record: &'static str,
    ) -> Result<Option<T>, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .get(key)
            .map(|raw| alloy_rlp::decode_exact(&raw).map_err(|source| StoreError { record, source }))
            .transpose()
    }

    fn set_rlp<T: alloy_rlp::Encodable>(&self, key: Vec<u8>, value: &T) {
        self.inner.lock().unwrap().set(key, alloy_rlp::encode(value));
    }

    /// The committed-batch record for `index`.
    pub fn committed_batch(&self, index: u64) -> Result<Option<CommittedBatchMeta>, StoreError> {
        self.get_rlp(&indexed_key(COMMITTED_BATCH_PREFIX, index), "committed batch")
    }

    /// Writes the committed-batch record for `index`.
    pub fn set_committed_batch(&self, index: u64, meta: &CommittedBatchMeta) {
        self.set_rlp(indexed_key(COMMITTED_BATCH_PREFIX, index), meta);
    }

    /// Deletes the committed-batch record for `index`.
    pub fn delete_committed_batch(&self, index: u64) {
        self.inner.lock().unwrap().delete(&indexed_key(COMMITTED_BATCH_PREFIX, index));
    }

    /// The finalized-batch record for `index`.
    pub fn finalized_batch(&self, index: u64) -> Result<Option<FinalizedBatchMeta>, StoreError> {
        self.get_rlp(&indexed_key(FINALIZED_BATCH_PREFIX, index), "finalized batch")
    }

    /// Writes the finalized-batch record for `index`.
    pub fn set_finalized_batch(&self, index: u64, meta: &FinalizedBatchMeta) {
        self.set_rlp(indexed_key(FINALIZED_BATCH_PREFIX, index), meta);
    }

    /// The verifier's finalize high-water mark.
    pub fn last_finalized_batch_index(&self) -> Result<Option<u64>, StoreError> {
        self.get_rlp(LAST_FINALIZED_INDEX_KEY, "last finalized index")
    }

    /// Writes the verifier's finalize high-water mark.
    pub fn set_last_finalized_batch_index(&self, index: u64) {
        self.set_rlp(LAST_FINALIZED_INDEX_KEY.to_vec(), &index);
    }

    /// The highest finalized L2 block number.
    pub fn finalized_l2_block_number(&self) -> Result<Option<u64>, StoreError> {
        self.get_rlp(FINALIZED_L2_BLOCK_KEY, "finalized L2 block")
    }

    /// Writes the highest finalized L2 block number.
    pub fn set_finalized_l2_block_number(&self, number: u64) {
        self.set_rlp(FINALIZED_L2_BLOCK_KEY.to_vec(), &number);
    }

    /// The verifier's L1 scan cursor.
    pub fn rollup_event_synced_l1_block(&self) -> Result<Option<u64>, StoreError> {
        self.get_rlp(EVENT_SYNCED_L1_BLOCK_KEY, "event synced L1 block")
    }

    /// Writes the verifier's L1 scan cursor.
    pub fn set_rollup_event_synced_l1_block(&self, number: u64) {
        self.set_rlp(EVENT_SYNCED_L1_BLOCK_KEY.to_vec(), &number);
    }
}

impl<KV: KeyValueStore> CheckpointStore for RollupStore<KV> {
    type Error = StoreError;

    fn processed_batch(&self) -> Result<Option<DaProcessedBatchMeta>, Self::Error> {
        self.get_rlp(PROCESSED_BATCH_KEY, "processed batch")
    }

    fn set_processed_batch(&mut self, meta: &DaProcessedBatchMeta) -> Result<(), Self::Error> {
        self.set_rlp(PROCESSED_BATCH_KEY.to_vec(), meta);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use mako_primitives::meta::BlockRange;

    #[test]
    fn test_processed_batch_roundtrip() {
        let mut store = RollupStore::new(MemoryKeyValueStore::new());
        assert!(store.processed_batch().unwrap().is_none());

        let meta = DaProcessedBatchMeta {
            batch_index: 9,
            l1_block_number: 500,
            total_l1_messages_popped: 12,
        };
        store.set_processed_batch(&meta).unwrap();
        assert_eq!(store.processed_batch().unwrap(), Some(meta));
    }

    #[test]
    fn test_indexed_records_are_isolated() {
        let store = RollupStore::new(MemoryKeyValueStore::new());
        let meta = CommittedBatchMeta {
            version: 7,
            block_ranges: vec![BlockRange { start: 1, end: 4 }],
            post_l1_queue_hash: B256::with_last_byte(1),
            ..Default::default()
        };
        store.set_committed_batch(3, &meta);
        assert_eq!(store.committed_batch(3).unwrap(), Some(meta));
        assert!(store.committed_batch(4).unwrap().is_none());

        store.delete_committed_batch(3);
        assert!(store.committed_batch(3).unwrap().is_none());
    }

    #[test]
    fn test_clones_share_the_backend() {
        let store = RollupStore::new(MemoryKeyValueStore::new());
        let observer = store.clone();
        store.set_last_finalized_batch_index(88);
        assert_eq!(observer.last_finalized_batch_index().unwrap(), Some(88));
    }

    #[test]
    fn test_corrupt_record_is_an_error() {
        let store = RollupStore::new(MemoryKeyValueStore::new());
        store.inner.lock().unwrap().set(PROCESSED_BATCH_KEY.to_vec(), vec![0xff, 0x00]);
        assert!(CheckpointStore::processed_batch(&store).is_err());
    }
}
