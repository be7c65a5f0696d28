//! The rollup-event verifier: an independent task that re-derives batch
//! commitments from the locally executed chain and checks every finalized
//! batch against its on-chain event, halting the node on divergence.

use crate::{
    config::ResetSyncHeight,
    db::{KeyValueStore, RollupStore, StoreError},
    traits::L2ChainProvider,
};
use alloy_primitives::B256;
use mako_derive::{
    entries::{CommitEntry, DaEntry},
    errors::DeriveErrorKind,
    source::DataSource,
    traits::{BlobProvider, L1MessageProvider, L1Provider},
};
use mako_primitives::{
    batch::{batch_data_hash, chunk_hash, full_blob_batch_hash, genesis_batch_header, BatchHeader},
    meta::{CommittedBatchMeta, FinalizedBatchMeta},
    CodecVersion,
};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Default verifier tick interval.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(30);
/// Default number of waits for the local head to reach a batch's end block.
pub const DEFAULT_HEAD_WAIT_RETRIES: u32 = 20;
/// Default delay between head waits.
pub const DEFAULT_HEAD_WAIT_DELAY: Duration = Duration::from_secs(60);

/// Tunables of the verifier task.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Interval between L1 sync ticks.
    pub tick_interval: Duration,
    /// Head waits before a finalize check gives up for this tick.
    pub head_wait_retries: u32,
    /// Delay between head waits.
    pub head_wait_delay: Duration,
    /// Known mismatches resolved by rewinding instead of halting.
    pub reset_sync_heights: Vec<ResetSyncHeight>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            head_wait_retries: DEFAULT_HEAD_WAIT_RETRIES,
            head_wait_delay: DEFAULT_HEAD_WAIT_DELAY,
            reset_sync_heights: Vec::new(),
        }
    }
}

/// Why the verifier stopped. Every variant except [`VerifierError::Halt`]
/// is an infrastructure failure; `Halt` means the local chain diverged from
/// the finalized rollup state and the node must not continue.
#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    /// The pipeline beneath the verifier failed.
    #[error("derivation error: {0}")]
    Derive(#[from] DeriveErrorKind),
    /// Persisted verifier state is corrupt.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// The local chain provider failed.
    #[error("chain provider error: {0}")]
    Chain(String),
    /// Local state diverged from a finalized batch.
    #[error("finalized batch {index} diverged: {field} local {local}, on-chain {onchain}")]
    Halt {
        /// The diverging batch.
        index: u64,
        /// Which commitment diverged.
        field: &'static str,
        /// The locally computed value.
        local: B256,
        /// The value the finalize event carries.
        onchain: B256,
    },
}

/// The verifier task. Owns its own [DataSource] over the same L1 data the
/// derivation pipeline consumes, with an independent persisted cursor.
#[derive(Debug)]
pub struct RollupEventVerifier<P, B, M, L, KV> {
    source: DataSource<P, B, M>,
    chain: L,
    store: RollupStore<KV>,
    config: VerifierConfig,
}

impl<P, B, M, L, KV> RollupEventVerifier<P, B, M, L, KV>
where
    P: L1Provider + Send,
    B: BlobProvider + Send,
    M: L1MessageProvider + Send + Sync,
    L: L2ChainProvider + Send + Sync,
    KV: KeyValueStore + Send,
{
    /// Creates a verifier resuming from its persisted L1 cursor, falling
    /// back to `genesis_l1_block`. Seeds the finalized-batch chain with the
    /// genesis batch when the store is empty.
    pub fn new(
        l1: P,
        blobs: B,
        messages: M,
        chain: L,
        store: RollupStore<KV>,
        config: VerifierConfig,
        genesis_l1_block: u64,
    ) -> Result<Self, VerifierError> {
        let cursor = store.rollup_event_synced_l1_block()?.unwrap_or(genesis_l1_block);
        if store.finalized_batch(0)?.is_none() {
            store.set_finalized_batch(
                0,
                &FinalizedBatchMeta {
                    batch_hash: genesis_batch_header().hash(),
                    ..Default::default()
                },
            );
        }
        let source = DataSource::new(l1, blobs, messages, cursor);
        Ok(Self { source, chain, store, config })
    }

    /// Runs sync ticks until shutdown or a halt condition.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), VerifierError> {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => return Ok(()),
                _ = ticker.tick() => {}
            }
            match self.sync_tick().await {
                Ok(()) => {}
                Err(VerifierError::Derive(e)) if e.is_temporary() => {
                    debug!(target: "rollup-verifier", error = %e, "tick interrupted, retrying");
                }
                Err(e @ VerifierError::Halt { .. }) => {
                    error!(target: "rollup-verifier", error = %e, "local chain diverged from finalized state");
                    return Err(e);
                }
                Err(VerifierError::Chain(reason)) => {
                    warn!(target: "rollup-verifier", reason, "chain provider failed, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Drains the source up to the finalized L1 tip, processing every entry
    /// and persisting the cursor after each fully handled range.
    pub async fn sync_tick(&mut self) -> Result<(), VerifierError> {
        loop {
            let entries = match self.source.next_data().await {
                Ok(entries) => entries,
                Err(e) if e.is_end_of_source() => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            for entry in entries {
                if let Some(reset) = self.process_entry(entry).await? {
                    warn!(
                        target: "rollup-verifier",
                        l1_height = reset,
                        "known mismatch, rewinding verifier cursor"
                    );
                    self.source.reset(reset);
                    self.store.set_rollup_event_synced_l1_block(reset);
                    return Ok(());
                }
            }
            self.store.set_rollup_event_synced_l1_block(self.source.l1_height());
        }
    }

    /// Handles one DA entry. Returns a rewind height when a known historical
    /// mismatch fires.
    async fn process_entry(&mut self, entry: DaEntry) -> Result<Option<u64>, VerifierError> {
        match entry {
            DaEntry::Commit(commit) => {
                self.record_commit(&commit)?;
                Ok(None)
            }
            DaEntry::Revert { index, .. } => {
                self.store.delete_committed_batch(index);
                debug!(target: "rollup-verifier", batch = index, "dropped committed metadata");
                Ok(None)
            }
            DaEntry::RevertRange { start, finish, .. } => {
                for index in start..=finish {
                    self.store.delete_committed_batch(index);
                }
                debug!(
                    target: "rollup-verifier",
                    start, finish, "dropped committed metadata range"
                );
                Ok(None)
            }
            DaEntry::Finalize { index, batch_hash, state_root, withdraw_root, .. } => {
                self.verify_finalized(index, batch_hash, state_root, withdraw_root).await
            }
        }
    }

    /// Records per-batch metadata at commit time, continuing the message
    /// queue hash chain from the parent commit where one is known.
    fn record_commit(&mut self, commit: &CommitEntry) -> Result<(), VerifierError> {
        if commit.version.has_full_blob_payload() {
            if let Some(parent) = self.store.committed_batch(commit.index.saturating_sub(1))? {
                if parent.version >= CodecVersion::FULL_BLOB_PAYLOAD
                    && parent.post_l1_queue_hash != commit.prev_l1_queue_hash
                {
                    return Err(VerifierError::Halt {
                        index: commit.index,
                        field: "message queue hash",
                        local: parent.post_l1_queue_hash,
                        onchain: commit.prev_l1_queue_hash,
                    });
                }
            }
        }
        let meta = CommittedBatchMeta {
            version: commit.version.value(),
            block_ranges: commit.chunk_ranges(),
            post_l1_queue_hash: commit.post_l1_queue_hash,
            blob_versioned_hash: commit.blob_versioned_hash.unwrap_or_default(),
            skipped_bitmap: commit.skipped_bitmap.as_bytes().clone(),
            l1_message_popped: commit.l1_message_popped,
            total_l1_message_popped: commit.total_l1_popped(),
        };
        self.store.set_committed_batch(commit.index, &meta);
        debug!(target: "rollup-verifier", batch = commit.index, "recorded committed metadata");
        Ok(())
    }

    /// Verifies every batch from the last finalized index through `index`.
    /// Under bundle finalization only the event's own batch carries on-chain
    /// roots; interior batches are recomputed to extend the hash chain.
    async fn verify_finalized(
        &mut self,
        index: u64,
        event_batch_hash: B256,
        event_state_root: B256,
        event_withdraw_root: B256,
    ) -> Result<Option<u64>, VerifierError> {
        let last = self.store.last_finalized_batch_index()?.unwrap_or(0);
        for batch in last + 1..=index {
            let Some(meta) = self.store.committed_batch(batch)? else {
                // Commit metadata can trail after recovery; retry later.
                warn!(target: "rollup-verifier", batch, "no committed metadata yet");
                return Err(mako_derive::errors::DeriveError::Eof.temp().into());
            };

            let (computed_hash, state_root, withdraw_root, end_block) =
                self.recompute_batch(batch, &meta).await?;

            if batch == index {
                let checks = [
                    ("batch hash", computed_hash, event_batch_hash),
                    ("state root", state_root, event_state_root),
                    ("withdraw root", withdraw_root, event_withdraw_root),
                ];
                for (field, local, onchain) in checks {
                    if local != onchain {
                        if let Some(reset) = self.known_mismatch(event_batch_hash, computed_hash) {
                            return Ok(Some(reset));
                        }
                        error!(
                            target: "rollup-verifier",
                            batch,
                            field,
                            %local,
                            %onchain,
                            "finalized batch diverged"
                        );
                        return Err(VerifierError::Halt { index: batch, field, local, onchain });
                    }
                }
            }

            self.store.set_finalized_batch(
                batch,
                &FinalizedBatchMeta {
                    batch_hash: computed_hash,
                    total_l1_message_popped: meta.total_l1_message_popped,
                    state_root,
                    withdraw_root,
                },
            );
            self.store.set_last_finalized_batch_index(batch);
            if let Some(end) = end_block {
                self.store.set_finalized_l2_block_number(end);
            }
            info!(target: "rollup-verifier", batch, "finalized batch verified");
        }
        Ok(None)
    }

    /// Rebuilds a batch's commitment from canonical local blocks and the
    /// stored commit metadata, waiting for the local head to reach the
    /// batch's end block.
    async fn recompute_batch(
        &mut self,
        index: u64,
        meta: &CommittedBatchMeta,
    ) -> Result<(B256, B256, B256, Option<u64>), VerifierError> {
        let parent_hash = self
            .store
            .finalized_batch(index.saturating_sub(1))?
            .map(|m| m.batch_hash)
            .unwrap_or_default();
        let version = CodecVersion::new(meta.version);

        let Some(end_block) = meta.block_ranges.last().map(|r| r.end) else {
            // The genesis placeholder carries no blocks.
            return Ok((genesis_batch_header().hash(), B256::ZERO, B256::ZERO, None));
        };
        self.wait_for_head(end_block).await?;

        let mut chunk_hashes = Vec::with_capacity(meta.block_ranges.len());
        let mut last_digest = None;
        for range in &meta.block_ranges {
            let mut digests = Vec::with_capacity((range.end - range.start + 1) as usize);
            for number in range.start..=range.end {
                let digest = self
                    .chain
                    .block_digest(number)
                    .await
                    .map_err(|e| VerifierError::Chain(e.to_string()))?;
                digests.push(digest);
            }
            chunk_hashes.push(chunk_hash(version, &digests));
            last_digest = digests.pop();
        }
        let last_digest = last_digest.expect("ranges are non-empty");

        let computed_hash = if version.has_full_blob_payload() {
            full_blob_batch_hash(meta.version, index, meta.blob_versioned_hash, parent_hash)
        } else {
            BatchHeader {
                version: meta.version,
                index,
                l1_message_popped: meta.l1_message_popped,
                total_l1_message_popped: meta.total_l1_message_popped,
                data_hash: batch_data_hash(&chunk_hashes),
                blob_versioned_hash: version.uses_blob().then_some(meta.blob_versioned_hash),
                parent_batch_hash: parent_hash,
                skipped_bitmap: meta.skipped_bitmap.clone(),
            }
            .hash()
        };

        Ok((computed_hash, last_digest.state_root, last_digest.withdraw_root, Some(end_block)))
    }

    /// Waits until the local chain has executed up to `end_block`, retrying
    /// a bounded number of times.
    async fn wait_for_head(&self, end_block: u64) -> Result<(), VerifierError> {
        for attempt in 0..=self.config.head_wait_retries {
            let head = self
                .chain
                .head_number()
                .await
                .map_err(|e| VerifierError::Chain(e.to_string()))?;
            if head >= end_block {
                return Ok(());
            }
            if attempt == self.config.head_wait_retries {
                break;
            }
            debug!(
                target: "rollup-verifier",
                head,
                end_block,
                attempt,
                "local head behind batch end, waiting"
            );
            tokio::time::sleep(self.config.head_wait_delay).await;
        }
        // Give the tick up; the next one retries from the same batch.
        Err(mako_derive::errors::DeriveError::Eof.temp().into())
    }

    /// Looks a mismatch up in the configured reset table.
    fn known_mismatch(&self, event_hash: B256, computed_hash: B256) -> Option<u64> {
        self.config
            .reset_sync_heights
            .iter()
            .find(|r| r.batch_hash == event_hash || r.batch_hash == computed_hash)
            .map(|r| r.l1_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryKeyValueStore;
    use alloy_primitives::map::HashMap;
    use async_trait::async_trait;
    use mako_derive::test_utils::{
        block_context, log_ctx, test_l2_tx, v0_commit_fixture, TestBlobProvider, TestL1Provider,
        TestMessageProvider,
    };
    use mako_primitives::{batch::BlockDigest, event::RollupEvent, meta::BlockRange};
    use std::sync::{Arc, Mutex};

    const STATE_ROOT: B256 = B256::with_last_byte(0xaa);
    const WITHDRAW_ROOT: B256 = B256::with_last_byte(0xbb);

    /// A canonical chain fixture mapping block numbers to digests.
    #[derive(Debug, Default, Clone)]
    struct TestL2Chain {
        head: Arc<Mutex<u64>>,
        digests: HashMap<u64, BlockDigest>,
    }

    impl TestL2Chain {
        fn insert_block(&mut self, number: u64, nonce: u64) {
            let tx = test_l2_tx(nonce);
            self.digests.insert(
                number,
                BlockDigest {
                    context: block_context(number, 1, 0),
                    l1_tx_hashes: Vec::new(),
                    l2_tx_hashes: vec![*tx.tx_hash()],
                    state_root: STATE_ROOT,
                    withdraw_root: WITHDRAW_ROOT,
                },
            );
            let mut head = self.head.lock().unwrap();
            *head = (*head).max(number);
        }
    }

    #[async_trait]
    impl L2ChainProvider for TestL2Chain {
        type Error = std::convert::Infallible;

        async fn head_number(&self) -> Result<u64, Self::Error> {
            Ok(*self.head.lock().unwrap())
        }

        async fn block_digest(&self, number: u64) -> Result<BlockDigest, Self::Error> {
            Ok(self.digests.get(&number).cloned().unwrap_or_default())
        }
    }

    /// The batch hash the verifier should compute for a
    /// [`v0_commit_fixture`] batch whose blocks live in `chain`.
    fn expected_v0_hash(
        chain: &TestL2Chain,
        index: u64,
        ranges: &[BlockRange],
        parent_hash: B256,
    ) -> B256 {
        let chunk_hashes: Vec<B256> = ranges
            .iter()
            .map(|range| {
                let digests: Vec<BlockDigest> = (range.start..=range.end)
                    .map(|n| chain.digests.get(&n).cloned().unwrap())
                    .collect();
                chunk_hash(CodecVersion::new(0), &digests)
            })
            .collect();
        BatchHeader {
            version: 0,
            index,
            data_hash: batch_data_hash(&chunk_hashes),
            parent_batch_hash: parent_hash,
            ..Default::default()
        }
        .hash()
    }

    fn finalize_event(index: u64, batch_hash: B256, l1_block: u64) -> RollupEvent {
        RollupEvent::Finalize {
            index,
            batch_hash,
            state_root: STATE_ROOT,
            withdraw_root: WITHDRAW_ROOT,
            ctx: log_ctx(l1_block, 0xf0, 0),
        }
    }

    fn verifier(
        l1: TestL1Provider,
        chain: TestL2Chain,
        config: VerifierConfig,
    ) -> (
        RollupEventVerifier<
            TestL1Provider,
            TestBlobProvider,
            TestMessageProvider,
            TestL2Chain,
            MemoryKeyValueStore,
        >,
        RollupStore<MemoryKeyValueStore>,
    ) {
        let store = RollupStore::new(MemoryKeyValueStore::new());
        let observer = store.clone();
        let verifier = RollupEventVerifier::new(
            l1,
            TestBlobProvider::default(),
            TestMessageProvider::default(),
            chain,
            store,
            config,
            1,
        )
        .unwrap();
        (verifier, observer)
    }

    #[tokio::test]
    async fn test_commit_then_finalize_verifies_and_advances() {
        let fixture = v0_commit_fixture(1, 100, &[&[1, 2], &[3]]);
        let mut chain = TestL2Chain::default();
        for (number, nonce) in [(1u64, 1u64), (2, 2), (3, 3)] {
            chain.insert_block(number, nonce);
        }
        let expected = expected_v0_hash(
            &chain,
            1,
            &[BlockRange { start: 1, end: 2 }, BlockRange { start: 3, end: 3 }],
            genesis_batch_header().hash(),
        );

        let mut l1 = TestL1Provider { finalized: 120, ..Default::default() };
        l1.events.push(fixture.event.clone());
        l1.insert_tx(fixture.tx.clone());
        l1.events.push(finalize_event(1, expected, 110));

        let (mut verifier, store) = verifier(l1, chain, VerifierConfig::default());
        verifier.sync_tick().await.unwrap();

        assert_eq!(store.last_finalized_batch_index().unwrap(), Some(1));
        assert_eq!(store.finalized_l2_block_number().unwrap(), Some(3));
        let finalized = store.finalized_batch(1).unwrap().unwrap();
        assert_eq!(finalized.batch_hash, expected);
        assert_eq!(finalized.state_root, STATE_ROOT);
        assert_eq!(finalized.withdraw_root, WITHDRAW_ROOT);
        // The cursor advanced past the finalized tip.
        assert_eq!(store.rollup_event_synced_l1_block().unwrap(), Some(121));
    }

    #[tokio::test]
    async fn test_bundle_finalize_rebuilds_interior_batches() {
        // Two committed batches, one finalize event for the second.
        let first = v0_commit_fixture(1, 10, &[&[1]]);
        let second = v0_commit_fixture(2, 11, &[&[2]]);
        let mut chain = TestL2Chain::default();
        chain.insert_block(1, 1);
        chain.insert_block(2, 1);

        let h1 = expected_v0_hash(
            &chain,
            1,
            &[BlockRange { start: 1, end: 1 }],
            genesis_batch_header().hash(),
        );
        let h2 = expected_v0_hash(&chain, 2, &[BlockRange { start: 2, end: 2 }], h1);

        let mut l1 = TestL1Provider { finalized: 40, ..Default::default() };
        l1.events.push(first.event.clone());
        l1.insert_tx(first.tx.clone());
        l1.events.push(second.event.clone());
        l1.insert_tx(second.tx.clone());
        l1.events.push(finalize_event(2, h2, 20));

        let (mut verifier, store) = verifier(l1, chain, VerifierConfig::default());
        verifier.sync_tick().await.unwrap();

        // Both batches finalized; the interior one without event checks.
        assert_eq!(store.finalized_batch(1).unwrap().unwrap().batch_hash, h1);
        assert_eq!(store.finalized_batch(2).unwrap().unwrap().batch_hash, h2);
        assert_eq!(store.last_finalized_batch_index().unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_state_root_mismatch_halts() {
        let fixture = v0_commit_fixture(1, 10, &[&[1]]);
        let mut chain = TestL2Chain::default();
        chain.insert_block(1, 1);
        let expected = expected_v0_hash(
            &chain,
            1,
            &[BlockRange { start: 1, end: 1 }],
            genesis_batch_header().hash(),
        );

        let mut l1 = TestL1Provider { finalized: 40, ..Default::default() };
        l1.events.push(fixture.event.clone());
        l1.insert_tx(fixture.tx.clone());
        l1.events.push(RollupEvent::Finalize {
            index: 1,
            batch_hash: expected,
            state_root: B256::with_last_byte(0xde),
            withdraw_root: WITHDRAW_ROOT,
            ctx: log_ctx(20, 0xf0, 0),
        });

        let (mut verifier, store) = verifier(l1, chain, VerifierConfig::default());
        let err = verifier.sync_tick().await.unwrap_err();
        assert!(matches!(err, VerifierError::Halt { index: 1, field: "state root", .. }));
        // Nothing was finalized.
        assert_eq!(store.last_finalized_batch_index().unwrap(), None);
    }

    #[tokio::test]
    async fn test_known_mismatch_rewinds_instead_of_halting() {
        let fixture = v0_commit_fixture(1, 10, &[&[1]]);
        let mut chain = TestL2Chain::default();
        chain.insert_block(1, 1);
        // An event hash that cannot match the recomputed one.
        let bogus = B256::with_last_byte(0x66);

        let mut l1 = TestL1Provider { finalized: 40, ..Default::default() };
        l1.events.push(fixture.event.clone());
        l1.insert_tx(fixture.tx.clone());
        l1.events.push(finalize_event(1, bogus, 20));

        let config = VerifierConfig {
            reset_sync_heights: vec![ResetSyncHeight { batch_hash: bogus, l1_height: 7 }],
            ..Default::default()
        };
        let (mut verifier, store) = verifier(l1, chain, config);
        verifier.sync_tick().await.unwrap();
        assert_eq!(store.rollup_event_synced_l1_block().unwrap(), Some(7));
        assert_eq!(store.last_finalized_batch_index().unwrap(), None);
    }

    #[tokio::test]
    async fn test_lagging_head_retries_later() {
        let fixture = v0_commit_fixture(1, 10, &[&[5]]);
        // The local chain has not executed block 5 yet.
        let chain = TestL2Chain::default();
        let mut l1 = TestL1Provider { finalized: 40, ..Default::default() };
        l1.events.push(fixture.event.clone());
        l1.insert_tx(fixture.tx.clone());
        l1.events.push(finalize_event(1, B256::with_last_byte(1), 20));

        let config = VerifierConfig {
            head_wait_retries: 0,
            head_wait_delay: Duration::from_millis(1),
            ..Default::default()
        };
        let (mut verifier, store) = verifier(l1, chain, config);
        let err = verifier.sync_tick().await.unwrap_err();
        assert!(matches!(err, VerifierError::Derive(e) if e.is_temporary()));
        assert_eq!(store.last_finalized_batch_index().unwrap(), None);
    }

    #[tokio::test]
    async fn test_revert_drops_committed_metadata() {
        let fixture = v0_commit_fixture(1, 10, &[&[1]]);
        let mut l1 = TestL1Provider { finalized: 40, ..Default::default() };
        l1.events.push(fixture.event.clone());
        l1.insert_tx(fixture.tx.clone());
        l1.events.push(RollupEvent::Revert {
            index: 1,
            batch_hash: B256::with_last_byte(1),
            ctx: log_ctx(12, 0x31, 0),
        });

        let (mut verifier, store) = verifier(l1, TestL2Chain::default(), VerifierConfig::default());
        verifier.sync_tick().await.unwrap();
        assert!(store.committed_batch(1).unwrap().is_none());
    }
}
