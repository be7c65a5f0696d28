//! Typed rollup events recovered from L1 logs, with the L1 ordering
//! metadata the pipeline needs to group and sequence them.

use crate::contract::{revert_range, revert_single, IRollup};
use alloy_primitives::{Log, B256, U256};
use alloy_sol_types::SolEvent;

/// A minimal reference to an L1 block.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct L1BlockRef {
    /// The block number.
    pub number: u64,
    /// The block hash.
    pub hash: B256,
    /// The parent block hash.
    pub parent_hash: B256,
    /// The block timestamp.
    pub timestamp: u64,
}

/// Where on L1 a log was emitted; carries everything ordering depends on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LogContext {
    /// The emitting block's number.
    pub block_number: u64,
    /// The emitting block's hash.
    pub block_hash: B256,
    /// The emitting block's timestamp.
    pub block_timestamp: u64,
    /// The originating transaction hash.
    pub tx_hash: B256,
    /// The transaction's index within its block.
    pub tx_index: u64,
    /// The log's index within its block.
    pub log_index: u64,
}

impl LogContext {
    /// The L1 block reference of the emitting block. The parent hash is not
    /// carried by logs and is left zero.
    pub const fn block_ref(&self) -> L1BlockRef {
        L1BlockRef {
            number: self.block_number,
            hash: self.block_hash,
            parent_hash: B256::ZERO,
            timestamp: self.block_timestamp,
        }
    }
}

/// Errors produced while decoding rollup events from logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventDecodeError {
    /// The log has no topics.
    #[error("log has no topics")]
    MissingTopics,
    /// The log failed ABI validation for its topic0.
    #[error("malformed {event} log: {reason}")]
    Malformed {
        /// The event kind.
        event: &'static str,
        /// The ABI decoder's reason.
        reason: String,
    },
    /// A batch index does not fit in 64 bits.
    #[error("batch index {0} overflows u64")]
    IndexOverflow(U256),
}

/// A rollup-contract event the pipeline reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollupEvent {
    /// A batch was committed.
    Commit {
        /// The batch index.
        index: u64,
        /// The committed batch hash.
        batch_hash: B256,
        /// Where the event was emitted.
        ctx: LogContext,
    },
    /// A single batch was reverted (codec v0–v6).
    Revert {
        /// The reverted batch index.
        index: u64,
        /// The reverted batch hash.
        batch_hash: B256,
        /// Where the event was emitted.
        ctx: LogContext,
    },
    /// A contiguous batch range was reverted (codec v7+).
    RevertRange {
        /// First reverted index, inclusive.
        start: u64,
        /// Last reverted index, inclusive.
        finish: u64,
        /// Where the event was emitted.
        ctx: LogContext,
    },
    /// A batch (or, under bundling, a range ending at `index`) was finalized.
    Finalize {
        /// The last finalized batch index.
        index: u64,
        /// The finalized batch hash.
        batch_hash: B256,
        /// The finalized state root.
        state_root: B256,
        /// The finalized withdraw trie root.
        withdraw_root: B256,
        /// Where the event was emitted.
        ctx: LogContext,
    },
}

impl RollupEvent {
    /// The emission context of the event.
    pub const fn ctx(&self) -> &LogContext {
        match self {
            Self::Commit { ctx, .. }
            | Self::Revert { ctx, .. }
            | Self::RevertRange { ctx, .. }
            | Self::Finalize { ctx, .. } => ctx,
        }
    }

    /// Whether this is a commit event.
    pub const fn is_commit(&self) -> bool {
        matches!(self, Self::Commit { .. })
    }

    /// Decodes a rollup event out of a raw log. Returns `Ok(None)` for logs
    /// whose topic0 is none of the four rollup event signatures.
    pub fn decode_log(log: &Log, ctx: LogContext) -> Result<Option<Self>, EventDecodeError> {
        let Some(topic0) = log.data.topics().first() else {
            return Err(EventDecodeError::MissingTopics);
        };
        let event = match *topic0 {
            IRollup::CommitBatch::SIGNATURE_HASH => {
                let ev = IRollup::CommitBatch::decode_log(log, true)
                    .map_err(|e| malformed("CommitBatch", e))?
                    .data;
                Self::Commit {
                    index: index_to_u64(ev.batchIndex)?,
                    batch_hash: ev.batchHash,
                    ctx,
                }
            }
            revert_single::RevertBatch::SIGNATURE_HASH => {
                let ev = revert_single::RevertBatch::decode_log(log, true)
                    .map_err(|e| malformed("RevertBatch", e))?
                    .data;
                Self::Revert {
                    index: index_to_u64(ev.batchIndex)?,
                    batch_hash: ev.batchHash,
                    ctx,
                }
            }
            revert_range::RevertBatch::SIGNATURE_HASH => {
                let ev = revert_range::RevertBatch::decode_log(log, true)
                    .map_err(|e| malformed("RevertBatch", e))?
                    .data;
                Self::RevertRange {
                    start: index_to_u64(ev.startBatchIndex)?,
                    finish: index_to_u64(ev.finishBatchIndex)?,
                    ctx,
                }
            }
            IRollup::FinalizeBatch::SIGNATURE_HASH => {
                let ev = IRollup::FinalizeBatch::decode_log(log, true)
                    .map_err(|e| malformed("FinalizeBatch", e))?
                    .data;
                Self::Finalize {
                    index: index_to_u64(ev.batchIndex)?,
                    batch_hash: ev.batchHash,
                    state_root: ev.stateRoot,
                    withdraw_root: ev.withdrawRoot,
                    ctx,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

fn malformed(event: &'static str, err: alloy_sol_types::Error) -> EventDecodeError {
    EventDecodeError::Malformed { event, reason: err.to_string() }
}

fn index_to_u64(index: U256) -> Result<u64, EventDecodeError> {
    index.try_into().map_err(|_| EventDecodeError::IndexOverflow(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, LogData};

    fn ctx() -> LogContext {
        LogContext { block_number: 100, ..Default::default() }
    }

    fn raw_log(topics: Vec<B256>, data: Vec<u8>) -> Log {
        Log { address: Address::ZERO, data: LogData::new_unchecked(topics, data.into()) }
    }

    #[test]
    fn test_decode_commit() {
        let log = raw_log(
            vec![
                IRollup::CommitBatch::SIGNATURE_HASH,
                B256::from(U256::from(5u64)),
                B256::with_last_byte(0xab),
            ],
            vec![],
        );
        let event = RollupEvent::decode_log(&log, ctx()).unwrap().unwrap();
        assert_eq!(
            event,
            RollupEvent::Commit {
                index: 5,
                batch_hash: B256::with_last_byte(0xab),
                ctx: ctx()
            }
        );
        assert!(event.is_commit());
    }

    #[test]
    fn test_decode_revert_range() {
        let log = raw_log(
            vec![
                revert_range::RevertBatch::SIGNATURE_HASH,
                B256::from(U256::from(11u64)),
                B256::from(U256::from(12u64)),
            ],
            vec![],
        );
        let event = RollupEvent::decode_log(&log, ctx()).unwrap().unwrap();
        assert_eq!(event, RollupEvent::RevertRange { start: 11, finish: 12, ctx: ctx() });
    }

    #[test]
    fn test_decode_finalize() {
        let mut data = Vec::new();
        data.extend_from_slice(B256::with_last_byte(1).as_slice());
        data.extend_from_slice(B256::with_last_byte(2).as_slice());
        let log = raw_log(
            vec![
                IRollup::FinalizeBatch::SIGNATURE_HASH,
                B256::from(U256::from(9u64)),
                B256::with_last_byte(0xcd),
            ],
            data,
        );
        let event = RollupEvent::decode_log(&log, ctx()).unwrap().unwrap();
        assert_eq!(
            event,
            RollupEvent::Finalize {
                index: 9,
                batch_hash: B256::with_last_byte(0xcd),
                state_root: B256::with_last_byte(1),
                withdraw_root: B256::with_last_byte(2),
                ctx: ctx()
            }
        );
    }

    #[test]
    fn test_unknown_topic_is_skipped() {
        let log = raw_log(vec![B256::with_last_byte(0xff)], vec![]);
        assert_eq!(RollupEvent::decode_log(&log, ctx()).unwrap(), None);
    }

    #[test]
    fn test_index_overflow_is_rejected() {
        let log = raw_log(
            vec![
                IRollup::CommitBatch::SIGNATURE_HASH,
                B256::from(U256::MAX),
                B256::with_last_byte(0xab),
            ],
            vec![],
        );
        assert!(matches!(
            RollupEvent::decode_log(&log, ctx()),
            Err(EventDecodeError::IndexOverflow(_))
        ));
    }
}
