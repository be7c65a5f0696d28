//! A lazy FIFO over the data source that owns the durable L1 cursor.

use crate::{
    entries::DaEntry,
    errors::{DeriveError, DeriveResult},
    source::DataSource,
    traits::{BlobProvider, L1MessageProvider, L1Provider},
};
use std::collections::VecDeque;
use tracing::trace;

/// Buffers decoded DA entries and refills from the [DataSource] on demand.
/// When the source exhausts at the finalized tip the queue surfaces EOF and
/// leaves the source positioned at its final cursor, so the next refill
/// behaves like reopening a fresh source there.
#[derive(Debug)]
pub struct DaQueue<P, B, M> {
    source: DataSource<P, B, M>,
    entries: VecDeque<DaEntry>,
}

impl<P, B, M> DaQueue<P, B, M>
where
    P: L1Provider + Send,
    B: BlobProvider + Send,
    M: L1MessageProvider + Send + Sync,
{
    /// Creates a queue over `source`.
    pub const fn new(source: DataSource<P, B, M>) -> Self {
        Self { source, entries: VecDeque::new() }
    }

    /// The L1 cursor: the next block the underlying source will scan.
    pub const fn l1_cursor(&self) -> u64 {
        self.source.l1_height()
    }

    /// Pops the next DA entry, refilling from the source when the buffer is
    /// empty. Source exhaustion converts to [`DeriveError::Eof`].
    pub async fn next_da(&mut self) -> DeriveResult<DaEntry> {
        loop {
            if let Some(entry) = self.entries.pop_front() {
                return Ok(entry);
            }
            match self.source.next_data().await {
                Ok(entries) => {
                    trace!(target: "da-queue", buffered = entries.len(), "refilled");
                    self.entries.extend(entries);
                }
                Err(e) if e.is_end_of_source() => return Err(DeriveError::Eof.temp()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Discards buffered entries and repositions the cursor.
    pub fn reset(&mut self, l1_height: u64) {
        trace!(target: "da-queue", l1_height, "reset");
        self.entries.clear();
        self.source.reset(l1_height);
    }
}
