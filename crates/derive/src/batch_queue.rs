//! Orders committed batches, applies reverts, and releases batches as
//! finalize events raise the high-water mark.

use crate::{
    da_queue::DaQueue,
    entries::{CommitEntry, DaEntry},
    errors::{DeriveError, DeriveResult},
    traits::{BlobProvider, CheckpointStore, L1MessageProvider, L1Provider},
};
use alloy_primitives::map::HashMap;
use mako_primitives::meta::DaProcessedBatchMeta;
use std::{cmp::Reverse, collections::BinaryHeap};
use tracing::{debug, warn};

/// Buffers commit entries in a min-heap keyed by batch index and yields them
/// in strict ascending order once finalized. Reverts delete pending entries;
/// the index-to-entry map doubles as the live set, so heap keys whose entry
/// was deleted are skipped lazily on pop.
#[derive(Debug)]
pub struct BatchQueue<P, B, M, S> {
    prev: DaQueue<P, B, M>,
    store: S,
    /// High-water mark raised by finalize events.
    last_finalized_batch_index: u64,
    /// Min-heap of pending batch indices.
    heap: BinaryHeap<Reverse<u64>>,
    /// Live pending entries by batch index.
    commits: HashMap<u64, CommitEntry>,
    /// The last batch handed downstream; persisted one emission late so the
    /// stored record always names a fully executed batch.
    previous_batch: DaProcessedBatchMeta,
}

impl<P, B, M, S> BatchQueue<P, B, M, S>
where
    P: L1Provider + Send,
    B: BlobProvider + Send,
    M: L1MessageProvider + Send + Sync,
    S: CheckpointStore,
{
    /// Creates a batch queue resuming from `checkpoint`.
    pub fn new(prev: DaQueue<P, B, M>, store: S, checkpoint: DaProcessedBatchMeta) -> Self {
        Self {
            prev,
            store,
            last_finalized_batch_index: 0,
            heap: BinaryHeap::new(),
            commits: HashMap::default(),
            previous_batch: checkpoint,
        }
    }

    /// The in-memory checkpoint: the last batch handed downstream.
    pub const fn checkpoint(&self) -> &DaProcessedBatchMeta {
        &self.previous_batch
    }

    /// The upstream L1 cursor, for progress reporting.
    pub const fn l1_cursor(&self) -> u64 {
        self.prev.l1_cursor()
    }

    /// The finalize high-water mark.
    pub const fn last_finalized_batch_index(&self) -> u64 {
        self.last_finalized_batch_index
    }

    /// Returns the next finalized batch in strict ascending index order,
    /// pulling DA entries until one is released. Persists the previous
    /// checkpoint at the moment of emission.
    pub async fn next_batch(&mut self) -> DeriveResult<CommitEntry> {
        loop {
            if let Some(mut entry) = self.pop_ready() {
                let previous = self.previous_batch;
                if previous.batch_index > 0 && previous.batch_index + 1 != entry.index {
                    // Replays after a restart and holes left by reverts both
                    // land here; drop and keep draining.
                    warn!(
                        target: "batch-queue",
                        batch = entry.index,
                        processed = previous.batch_index,
                        "skipping non-adjacent batch"
                    );
                    continue;
                }

                entry.parent_total_l1_popped = previous.total_l1_messages_popped;
                self.store
                    .set_processed_batch(&previous)
                    .map_err(|e| DeriveError::Store(e.to_string()).crit())?;
                self.previous_batch = DaProcessedBatchMeta {
                    batch_index: entry.index,
                    l1_block_number: entry.ctx.block_number,
                    total_l1_messages_popped: previous.total_l1_messages_popped
                        + entry.l1_message_popped,
                };
                debug!(target: "batch-queue", batch = entry.index, "releasing batch");
                return Ok(entry);
            }

            match self.prev.next_da().await? {
                DaEntry::Commit(entry) => self.insert(*entry),
                DaEntry::Revert { index, .. } => self.remove(index),
                DaEntry::RevertRange { start, finish, .. } => {
                    for index in start..=finish {
                        self.remove(index);
                    }
                }
                DaEntry::Finalize { index, .. } => {
                    if index > self.last_finalized_batch_index {
                        debug!(target: "batch-queue", finalized = index, "raised high-water mark");
                        self.last_finalized_batch_index = index;
                    }
                }
            }
        }
    }

    /// Reinitializes from a checkpoint and rewinds the upstream cursor to
    /// its L1 block. The finalize mark is monotone and survives resets;
    /// finalize events behind the cursor will not be replayed.
    pub fn reset(&mut self, checkpoint: DaProcessedBatchMeta) {
        self.heap.clear();
        self.commits.clear();
        self.previous_batch = checkpoint;
        self.prev.reset(checkpoint.l1_block_number);
    }

    /// Rewinds the persisted L1 cursor by `blocks` (clamped at zero) and
    /// resets to the rewound checkpoint.
    pub fn rewind(&mut self, blocks: u64) -> DeriveResult<()> {
        let mut checkpoint = self.previous_batch;
        checkpoint.l1_block_number = checkpoint.l1_block_number.saturating_sub(blocks);
        self.store
            .set_processed_batch(&checkpoint)
            .map_err(|e| DeriveError::Store(e.to_string()).crit())?;
        warn!(
            target: "batch-queue",
            l1_block = checkpoint.l1_block_number,
            rewound = blocks,
            "rewound L1 cursor"
        );
        self.reset(checkpoint);
        Ok(())
    }

    fn insert(&mut self, entry: CommitEntry) {
        let index = entry.index;
        // Re-committed indices (after a revert) replace the pending entry;
        // the duplicate heap key is skipped when popped.
        self.heap.push(Reverse(index));
        self.commits.insert(index, entry);
    }

    fn remove(&mut self, index: u64) {
        if self.commits.remove(&index).is_some() {
            debug!(target: "batch-queue", batch = index, "reverted pending batch");
        }
    }

    fn pop_ready(&mut self) -> Option<CommitEntry> {
        while let Some(&Reverse(index)) = self.heap.peek() {
            if index > self.last_finalized_batch_index {
                return None;
            }
            self.heap.pop();
            // Reverted entries leave stale heap keys behind.
            if let Some(entry) = self.commits.remove(&index) {
                return Some(entry);
            }
        }
        None
    }
}
