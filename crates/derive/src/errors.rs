//! Error types of the derivation pipeline, sorted by severity.

use alloy_primitives::B256;
use mako_primitives::{
    batch::BatchHeaderError,
    blob::BlobError,
    block::BlockContextError,
    event::EventDecodeError,
    message::BitmapError,
};
use thiserror::Error;

/// A short-hand for bubbling up errors when a condition is not met.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err);
        }
    };
}

/// A `Result` whose error is a severity-tagged [DeriveError].
pub type DeriveResult<T> = Result<T, DeriveErrorKind>;

/// A top level filter for [DeriveError] that sorts by severity.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DeriveErrorKind {
    /// A temporary error; the step may be retried after a delay.
    #[error("temporary error: {0}")]
    Temporary(#[source] DeriveError),
    /// A critical error; the pipeline cannot make progress.
    #[error("critical error: {0}")]
    Critical(#[source] DeriveError),
}

impl DeriveErrorKind {
    /// Whether the pipeline is merely waiting for more data.
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Temporary(DeriveError::Eof))
    }

    /// Whether the data source has reached the finalized L1 tip.
    pub const fn is_end_of_source(&self) -> bool {
        matches!(self, Self::Temporary(DeriveError::EndOfSource))
    }

    /// Whether a retry may succeed.
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }
}

/// An error encountered while deriving L2 blocks from L1 data.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DeriveError {
    /// There is no data to read yet. Either the pipeline is drained to the
    /// finalized tip or a required L1 message has not been collected.
    #[error("EOF")]
    Eof,
    /// The data source has scanned up to the last finalized L1 block.
    #[error("data source exhausted")]
    EndOfSource,
    /// A provider backend failed.
    #[error("provider error: {0}")]
    Provider(String),
    /// Every configured blob client failed for one lookup.
    #[error("all blob clients exhausted for blob {0}")]
    BlobClientsExhausted(B256),
    /// A fetched blob does not hash to the referenced versioned hash.
    #[error("blob hash mismatch: expected {expected}, computed {computed}")]
    BlobHashMismatch {
        /// The versioned hash referenced by the commit transaction.
        expected: B256,
        /// The versioned hash recomputed from the fetched blob.
        computed: B256,
    },
    /// A locally computed batch hash does not match the commit event.
    #[error("batch {index} hash mismatch: event {event}, computed {computed}")]
    BatchHashMismatch {
        /// The batch index.
        index: u64,
        /// The hash carried by the commit event.
        event: B256,
        /// The locally computed hash.
        computed: B256,
    },
    /// A commit transaction references fewer blobs than it has commit events.
    #[error("commit transaction carries {blobs} blobs for {events} commit events")]
    InsufficientBlobHashes {
        /// The number of commit events in the transaction.
        events: usize,
        /// The number of blob hashes the transaction references.
        blobs: usize,
    },
    /// The events grouped for one commit transaction are inconsistent.
    #[error("inconsistent commit group: {0}")]
    InconsistentCommitGroup(String),
    /// A commit transaction's selector matches no known commit method.
    #[error("unknown commit method selector {0:02x?}")]
    UnknownCommitSelector([u8; 4]),
    /// ABI decoding of commit-method arguments failed.
    #[error("commit calldata decode failed: {0}")]
    AbiDecode(String),
    /// A wire-format decode failed.
    #[error("codec error: {0}")]
    BadEncoding(#[from] CodecError),
    /// An L1 log failed event decoding.
    #[error("event decode failed: {0}")]
    Event(#[from] EventDecodeError),
    /// The checkpoint store failed.
    #[error("checkpoint store error: {0}")]
    Store(String),
}

impl DeriveError {
    /// Wrap as a [DeriveErrorKind::Critical].
    pub const fn crit(self) -> DeriveErrorKind {
        DeriveErrorKind::Critical(self)
    }

    /// Wrap as a [DeriveErrorKind::Temporary].
    pub const fn temp(self) -> DeriveErrorKind {
        DeriveErrorKind::Temporary(self)
    }
}

/// A wire-format decoding error.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// A block context failed to decode.
    #[error("block context: {0}")]
    BlockContext(#[from] BlockContextError),
    /// A blob payload failed to unpack.
    #[error("blob payload: {0}")]
    Blob(#[from] BlobError),
    /// A skipped bitmap is malformed.
    #[error("skipped bitmap: {0}")]
    Bitmap(#[from] BitmapError),
    /// A batch header failed to decode.
    #[error("batch header: {0}")]
    Header(#[from] BatchHeaderError),
    /// An RLP transaction failed to decode.
    #[error("transaction rlp: {0}")]
    Rlp(alloy_rlp::Error),
    /// The input ended before a structure was complete.
    #[error("truncated {0}")]
    Truncated(&'static str),
    /// Bytes remain after a structure that must consume its whole input.
    #[error("{structure} leaves {remaining} trailing bytes")]
    TrailingBytes {
        /// The structure that was decoded.
        structure: &'static str,
        /// The number of unconsumed bytes.
        remaining: usize,
    },
    /// Envelope decompression failed.
    #[error("envelope decompression failed: {0}")]
    Decompression(String),
    /// A v0 block context carries a non-zero reserved base fee.
    #[error("reserved base fee is non-zero in block {0}")]
    NonZeroReservedBaseFee(u64),
    /// The v7 message-queue hash chain does not reproduce the declared hash.
    #[error("message queue hash mismatch: declared {declared}, computed {computed}")]
    QueueHashMismatch {
        /// The hash declared in the blob envelope.
        declared: B256,
        /// The hash recomputed from the consumed messages.
        computed: B256,
    },
}
