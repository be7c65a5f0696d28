//! The stateful iterator over finalized L1 blocks that turns rollup events
//! into typed DA entries.

use crate::{
    decoder::decode_commit_group,
    ensure,
    entries::DaEntry,
    errors::{DeriveError, DeriveResult},
    traits::{BlobProvider, L1MessageProvider, L1Provider},
};
use mako_primitives::event::RollupEvent;
use tracing::{debug, trace};

/// Default number of L1 blocks scanned per step.
pub const DEFAULT_SCAN_STRIDE: u64 = 100;

/// A bounded-range scanner over finalized L1 blocks. Each [`next_data`]
/// call covers at most one stride of blocks, groups commit events by their
/// originating transaction, and decodes every group in one call.
///
/// [`next_data`]: DataSource::next_data
#[derive(Debug)]
pub struct DataSource<P, B, M> {
    l1: P,
    blobs: B,
    messages: M,
    /// Next L1 block to scan.
    l1_height: u64,
    /// Cached last known finalized L1 block.
    l1_finalized: u64,
    stride: u64,
}

impl<P, B, M> DataSource<P, B, M>
where
    P: L1Provider + Send,
    B: BlobProvider + Send,
    M: L1MessageProvider + Send + Sync,
{
    /// Creates a data source scanning from `l1_height`.
    pub fn new(l1: P, blobs: B, messages: M, l1_height: u64) -> Self {
        Self { l1, blobs, messages, l1_height, l1_finalized: 0, stride: DEFAULT_SCAN_STRIDE }
    }

    /// Overrides the scan stride.
    pub fn with_stride(mut self, stride: u64) -> Self {
        self.stride = stride.max(1);
        self
    }

    /// The next L1 block this source will scan.
    pub const fn l1_height(&self) -> u64 {
        self.l1_height
    }

    /// Repositions the scan cursor and drops the cached finalized height so
    /// the next step re-reads it, as a freshly opened source would.
    pub fn reset(&mut self, l1_height: u64) {
        self.l1_height = l1_height;
        self.l1_finalized = 0;
    }

    /// Scans the next bounded block range and returns its DA entries in L1
    /// order. Returns [`DeriveError::EndOfSource`] once the cursor passes
    /// the finalized tip; the cursor only advances when the whole range
    /// decodes, so failed ranges are retried in full.
    pub async fn next_data(&mut self) -> DeriveResult<Vec<DaEntry>> {
        let mut to = self.l1_height + self.stride - 1;
        if to > self.l1_finalized {
            self.l1_finalized = self
                .l1
                .finalized_block_number()
                .await
                .map_err(Into::into)?;
            trace!(target: "da-source", finalized = self.l1_finalized, "refreshed finalized head");
        }
        to = to.min(self.l1_finalized);
        if self.l1_height > to {
            return Err(DeriveError::EndOfSource.temp());
        }

        let events = self.l1.rollup_events(self.l1_height, to).await.map_err(Into::into)?;
        let entries = self.process_events(events).await?;

        debug!(
            target: "da-source",
            from = self.l1_height,
            to,
            entries = entries.len(),
            "scanned L1 range"
        );
        self.l1_height = to + 1;
        Ok(entries)
    }

    /// Walks events in L1 order, accumulating commit events per originating
    /// transaction and flushing each group through the decoder. Revert and
    /// finalize events pass through as singletons between groups.
    async fn process_events(&mut self, events: Vec<RollupEvent>) -> DeriveResult<Vec<DaEntry>> {
        let mut entries = Vec::new();
        let mut pending: Vec<RollupEvent> = Vec::new();

        for event in events {
            match &event {
                RollupEvent::Commit { ctx, .. } => {
                    if pending.last().is_some_and(|p| p.ctx().tx_hash != ctx.tx_hash) {
                        self.flush_group(&mut pending, &mut entries).await?;
                    }
                    pending.push(event);
                }
                RollupEvent::Revert { index, batch_hash: _, ctx } => {
                    self.flush_group(&mut pending, &mut entries).await?;
                    entries.push(DaEntry::Revert { index: *index, ctx: *ctx });
                }
                RollupEvent::RevertRange { start, finish, ctx } => {
                    self.flush_group(&mut pending, &mut entries).await?;
                    entries.push(DaEntry::RevertRange { start: *start, finish: *finish, ctx: *ctx });
                }
                RollupEvent::Finalize { index, batch_hash, state_root, withdraw_root, ctx } => {
                    self.flush_group(&mut pending, &mut entries).await?;
                    entries.push(DaEntry::Finalize {
                        index: *index,
                        batch_hash: *batch_hash,
                        state_root: *state_root,
                        withdraw_root: *withdraw_root,
                        ctx: *ctx,
                    });
                }
            }
        }
        self.flush_group(&mut pending, &mut entries).await?;
        Ok(entries)
    }

    async fn flush_group(
        &mut self,
        pending: &mut Vec<RollupEvent>,
        entries: &mut Vec<DaEntry>,
    ) -> DeriveResult<()> {
        if pending.is_empty() {
            return Ok(());
        }
        let group = core::mem::take(pending);
        check_group_consistency(&group)?;

        let ctx = *group[0].ctx();
        let tx = self
            .l1
            .commit_transaction(ctx.block_hash, ctx.tx_hash)
            .await
            .map_err(Into::into)?;
        let decoded =
            decode_commit_group(&group, &tx, &mut self.blobs, &self.messages).await?;
        entries.extend(decoded);
        Ok(())
    }
}

/// All commit events of one group must share the emitting L1 block and
/// carry strictly consecutive batch indices; anything else means the log
/// stream is corrupt.
fn check_group_consistency(group: &[RollupEvent]) -> DeriveResult<()> {
    let first = group[0].ctx();
    let mut previous: Option<u64> = None;
    for event in group {
        let RollupEvent::Commit { index, ctx, .. } = event else {
            return Err(DeriveError::InconsistentCommitGroup(
                "non-commit event grouped with commits".into(),
            )
            .crit());
        };
        ensure!(
            ctx.block_number == first.block_number && ctx.block_hash == first.block_hash,
            DeriveError::InconsistentCommitGroup(format!(
                "commit events of tx {} span L1 blocks {} and {}",
                ctx.tx_hash, first.block_number, ctx.block_number
            ))
            .crit()
        );
        if let Some(prev) = previous {
            ensure!(
                *index == prev + 1,
                DeriveError::InconsistentCommitGroup(format!(
                    "commit indices {prev} and {index} of tx {} are not consecutive",
                    ctx.tx_hash
                ))
                .crit()
            );
        }
        previous = Some(*index);
    }
    Ok(())
}
