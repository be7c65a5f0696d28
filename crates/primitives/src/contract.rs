//! `sol!` bindings for the rollup contract surface the pipeline consumes:
//! the three event kinds, the four commit methods, and the view methods.

use alloy_sol_types::sol;

sol! {
    /// The commit, finalize and view surface of the rollup contract.
    #[derive(Debug, PartialEq, Eq)]
    interface IRollup {
        /// Emitted once per committed batch.
        event CommitBatch(uint256 indexed batchIndex, bytes32 indexed batchHash);

        /// Emitted once per finalize transaction; under bundle finalization
        /// `batchIndex` is the last batch of the finalized range.
        event FinalizeBatch(
            uint256 indexed batchIndex,
            bytes32 indexed batchHash,
            bytes32 stateRoot,
            bytes32 withdrawRoot
        );

        /// The finalize argument bundle of `commitAndFinalizeBatch`.
        struct FinalizeStruct {
            bytes batchHeader;
            bytes32 postStateRoot;
            bytes32 withdrawRoot;
            bytes zkProof;
        }

        /// Legacy inline-calldata commit (codec v0).
        function commitBatch(
            uint8 version,
            bytes parentBatchHeader,
            bytes[] chunks,
            bytes skippedL1MessageBitmap
        ) external;

        /// Blob-backed commit with a KZG opening proof (codec v1–v6).
        function commitBatchWithBlobProof(
            uint8 version,
            bytes parentBatchHeader,
            bytes[] chunks,
            bytes skippedL1MessageBitmap,
            bytes blobDataProof
        ) external;

        /// Multi-batch blob-only commit (codec v7+); one blob per contained
        /// commit event.
        function commitBatches(
            uint8 version,
            bytes32 parentBatchHash,
            bytes32 lastBatchHash
        ) external;

        /// Blob-only commit immediately finalized in the same transaction.
        function commitAndFinalizeBatch(
            uint8 version,
            bytes32 parentBatchHash,
            FinalizeStruct finalizeStruct
        ) external;

        /// The queue index of the first L1 message not yet finalized.
        function nextUnfinalizedQueueIndex() external view returns (uint256);

        /// The highest finalized batch index.
        function lastFinalizedBatchIndex() external view returns (uint256);

        /// The finalized state root recorded for a batch index.
        function finalizedStateRoots(uint256 batchIndex) external view returns (bytes32);
    }
}

/// The single-index revert event emitted for codec v0–v6 batches.
///
/// Kept outside [`IRollup`]: both revert events share the solidity name but
/// differ in signature, so each gets its own binding module.
pub mod revert_single {
    use alloy_sol_types::sol;

    sol! {
        /// Reverts one previously committed batch.
        #[derive(Debug, PartialEq, Eq)]
        event RevertBatch(uint256 indexed batchIndex, bytes32 indexed batchHash);
    }
}

/// The range revert event emitted for codec v7+ batches.
pub mod revert_range {
    use alloy_sol_types::sol;

    sol! {
        /// Reverts every committed batch in `[startBatchIndex, finishBatchIndex]`.
        #[derive(Debug, PartialEq, Eq)]
        event RevertBatch(uint256 indexed startBatchIndex, uint256 indexed finishBatchIndex);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::{SolCall, SolEvent};

    #[test]
    fn test_event_topics_are_distinct() {
        let topics = [
            IRollup::CommitBatch::SIGNATURE_HASH,
            revert_single::RevertBatch::SIGNATURE_HASH,
            revert_range::RevertBatch::SIGNATURE_HASH,
            IRollup::FinalizeBatch::SIGNATURE_HASH,
        ];
        for (i, a) in topics.iter().enumerate() {
            for b in topics.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_commit_selectors_are_distinct() {
        let selectors = [
            IRollup::commitBatchCall::SELECTOR,
            IRollup::commitBatchWithBlobProofCall::SELECTOR,
            IRollup::commitBatchesCall::SELECTOR,
            IRollup::commitAndFinalizeBatchCall::SELECTOR,
        ];
        for (i, a) in selectors.iter().enumerate() {
            for b in selectors.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_commit_batch_roundtrip() {
        let call = IRollup::commitBatchCall {
            version: 0,
            parentBatchHeader: vec![1, 2, 3].into(),
            chunks: vec![vec![4, 5].into()],
            skippedL1MessageBitmap: vec![].into(),
        };
        let encoded = call.abi_encode();
        assert_eq!(&encoded[..4], IRollup::commitBatchCall::SELECTOR);
        let decoded = IRollup::commitBatchCall::abi_decode(&encoded, true).unwrap();
        assert_eq!(decoded.version, 0);
        assert_eq!(decoded.chunks.len(), 1);
    }
}
