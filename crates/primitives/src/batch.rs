//! Batch headers and the hash chain committed to by the rollup contract.

use crate::{block::BlockContext, CodecVersion};
use alloy_primitives::{keccak256, Bytes, B256};

/// Fixed-size prefix of a v0 batch header (bitmap excluded).
const HEADER_BASE_SIZE: usize = 89;
/// Fixed-size prefix of a v1–v6 batch header (bitmap excluded).
const HEADER_BLOB_SIZE: usize = 121;

/// Byte offset of the cumulative message counter inside an encoded header.
pub const TOTAL_POPPED_OFFSET: usize = 17;

/// Errors produced while decoding a batch header.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchHeaderError {
    /// The header is shorter than its fixed-size prefix.
    #[error("batch header too short: {0} bytes")]
    TooShort(usize),
    /// The bitmap tail is not word aligned.
    #[error("batch header bitmap misaligned: {0} trailing bytes")]
    MisalignedBitmap(usize),
    /// The header version requires a layout this decoder does not carry.
    #[error("batch header version {0} has no header encoding")]
    UnsupportedVersion(u8),
}

/// The batch header committed on chain for codec v0–v6.
///
/// Layout (big-endian): `version(1) | index(8) | l1_message_popped(8) |
/// total_l1_message_popped(8) | data_hash(32) | blob_versioned_hash(32, v1+)
/// | parent_batch_hash(32) | skipped_l1_message_bitmap(..)`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchHeader {
    /// The codec version byte.
    pub version: u8,
    /// The batch index.
    pub index: u64,
    /// Number of L1 messages popped by this batch (skipped included).
    pub l1_message_popped: u64,
    /// Cumulative L1 messages popped through this batch.
    pub total_l1_message_popped: u64,
    /// Commitment over the batch's chunks.
    pub data_hash: B256,
    /// The versioned hash of the batch blob; `None` for v0.
    pub blob_versioned_hash: Option<B256>,
    /// The parent batch's header hash.
    pub parent_batch_hash: B256,
    /// The skipped L1-message bitmap bytes.
    pub skipped_bitmap: Bytes,
}

impl BatchHeader {
    /// Encodes the header into its wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_BLOB_SIZE + self.skipped_bitmap.len());
        out.push(self.version);
        out.extend_from_slice(&self.index.to_be_bytes());
        out.extend_from_slice(&self.l1_message_popped.to_be_bytes());
        out.extend_from_slice(&self.total_l1_message_popped.to_be_bytes());
        out.extend_from_slice(self.data_hash.as_slice());
        if let Some(blob_hash) = self.blob_versioned_hash {
            out.extend_from_slice(blob_hash.as_slice());
        }
        out.extend_from_slice(self.parent_batch_hash.as_slice());
        out.extend_from_slice(&self.skipped_bitmap);
        out
    }

    /// Decodes a header from its wire form. The version byte selects the
    /// layout; v7+ batches have no header encoding (their commit methods
    /// carry a bare parent hash) and are rejected.
    pub fn decode(buf: &[u8]) -> Result<Self, BatchHeaderError> {
        let Some(&version) = buf.first() else {
            return Err(BatchHeaderError::TooShort(0));
        };
        if CodecVersion::new(version).has_full_blob_payload() {
            return Err(BatchHeaderError::UnsupportedVersion(version));
        }
        let base = if version == 0 { HEADER_BASE_SIZE } else { HEADER_BLOB_SIZE };
        if buf.len() < base {
            return Err(BatchHeaderError::TooShort(buf.len()));
        }
        if (buf.len() - base) % 32 != 0 {
            return Err(BatchHeaderError::MisalignedBitmap((buf.len() - base) % 32));
        }
        let index = u64::from_be_bytes(buf[1..9].try_into().unwrap());
        let l1_message_popped = u64::from_be_bytes(buf[9..17].try_into().unwrap());
        let total_l1_message_popped =
            u64::from_be_bytes(buf[TOTAL_POPPED_OFFSET..TOTAL_POPPED_OFFSET + 8].try_into().unwrap());
        let data_hash = B256::from_slice(&buf[25..57]);
        let (blob_versioned_hash, parent_at) = if version == 0 {
            (None, 57)
        } else {
            (Some(B256::from_slice(&buf[57..89])), 89)
        };
        let parent_batch_hash = B256::from_slice(&buf[parent_at..parent_at + 32]);
        Ok(Self {
            version,
            index,
            l1_message_popped,
            total_l1_message_popped,
            data_hash,
            blob_versioned_hash,
            parent_batch_hash,
            skipped_bitmap: Bytes::copy_from_slice(&buf[base..]),
        })
    }

    /// The header hash, which identifies the batch on chain.
    pub fn hash(&self) -> B256 {
        keccak256(self.encode())
    }
}

/// Reads the cumulative L1-messages-popped counter out of an encoded parent
/// batch header without decoding the rest.
pub fn total_popped_from_header_bytes(buf: &[u8]) -> Result<u64, BatchHeaderError> {
    if buf.len() < TOTAL_POPPED_OFFSET + 8 {
        return Err(BatchHeaderError::TooShort(buf.len()));
    }
    Ok(u64::from_be_bytes(buf[TOTAL_POPPED_OFFSET..TOTAL_POPPED_OFFSET + 8].try_into().unwrap()))
}

/// One block's contribution to a chunk commitment, reconstructible both from
/// DA (at decode time) and from the canonical local chain (at verify time).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BlockDigest {
    /// The block context.
    pub context: BlockContext,
    /// Hashes of the L1 messages consumed by the block, in queue order.
    pub l1_tx_hashes: Vec<B256>,
    /// Hashes of the block's L2 transactions, in block order.
    pub l2_tx_hashes: Vec<B256>,
    /// The block's post-state root (canonical chain only; zero from DA).
    pub state_root: B256,
    /// The block's withdraw trie root (canonical chain only; zero from DA).
    pub withdraw_root: B256,
}

/// Commitment over one chunk: block contexts, consumed L1-message hashes,
/// and (v0 only) L2 transaction hashes.
pub fn chunk_hash(version: CodecVersion, blocks: &[BlockDigest]) -> B256 {
    let mut preimage = Vec::with_capacity(blocks.len() * 128);
    for block in blocks {
        preimage.extend_from_slice(&block.context.encode());
    }
    for block in blocks {
        for hash in &block.l1_tx_hashes {
            preimage.extend_from_slice(hash.as_slice());
        }
        if version.chunk_commits_to_l2_txs() {
            for hash in &block.l2_tx_hashes {
                preimage.extend_from_slice(hash.as_slice());
            }
        }
    }
    keccak256(preimage)
}

/// Commitment over a batch's chunks: `keccak256` of the concatenated chunk
/// hashes.
pub fn batch_data_hash(chunk_hashes: &[B256]) -> B256 {
    let mut preimage = Vec::with_capacity(chunk_hashes.len() * 32);
    for hash in chunk_hashes {
        preimage.extend_from_slice(hash.as_slice());
    }
    keccak256(preimage)
}

/// The v7+ batch hash: `keccak256(version(1) || index(8, BE) ||
/// blob_versioned_hash(32) || parent_batch_hash(32))`.
pub fn full_blob_batch_hash(
    version: u8,
    index: u64,
    blob_versioned_hash: B256,
    parent_batch_hash: B256,
) -> B256 {
    let mut preimage = [0u8; 73];
    preimage[0] = version;
    preimage[1..9].copy_from_slice(&index.to_be_bytes());
    preimage[9..41].copy_from_slice(blob_versioned_hash.as_slice());
    preimage[41..73].copy_from_slice(parent_batch_hash.as_slice());
    keccak256(preimage)
}

/// The distinguished genesis batch header: version 0, index 0, all other
/// fields zero. Its hash anchors the batch hash chain.
pub fn genesis_batch_header() -> BatchHeader {
    BatchHeader::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    fn header(version: u8) -> BatchHeader {
        BatchHeader {
            version,
            index: 12,
            l1_message_popped: 3,
            total_l1_message_popped: 10,
            data_hash: B256::with_last_byte(0xaa),
            blob_versioned_hash: (version >= 1).then(|| B256::with_last_byte(0xbb)),
            parent_batch_hash: B256::with_last_byte(0xcc),
            skipped_bitmap: Bytes::from(vec![0u8; 32]),
        }
    }

    #[test]
    fn test_header_roundtrip_v0() {
        let h = header(0);
        assert_eq!(BatchHeader::decode(&h.encode()).unwrap(), h);
    }

    #[test]
    fn test_header_roundtrip_v4() {
        let h = header(4);
        assert_eq!(BatchHeader::decode(&h.encode()).unwrap(), h);
    }

    #[test]
    fn test_header_rejects_v7() {
        assert!(matches!(
            BatchHeader::decode(&[7u8; 121]),
            Err(BatchHeaderError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn test_total_popped_offset() {
        let h = header(0);
        let encoded = h.encode();
        assert_eq!(total_popped_from_header_bytes(&encoded).unwrap(), 10);
        // The counter sits at bytes 17..25 regardless of version.
        let encoded = header(4).encode();
        assert_eq!(total_popped_from_header_bytes(&encoded).unwrap(), 10);
    }

    #[test]
    fn test_chunk_hash_v0_commits_to_l2_txs() {
        let digest = BlockDigest {
            context: BlockContext {
                number: 1,
                timestamp: 100,
                base_fee: U256::ZERO,
                gas_limit: 10_000_000,
                num_transactions: 2,
                num_l1_messages: 1,
            },
            l1_tx_hashes: vec![B256::with_last_byte(1)],
            l2_tx_hashes: vec![B256::with_last_byte(2)],
            state_root: B256::ZERO,
            withdraw_root: B256::ZERO,
        };
        let with_l2 = chunk_hash(CodecVersion::new(0), core::slice::from_ref(&digest));
        let without_l2 = chunk_hash(CodecVersion::new(1), core::slice::from_ref(&digest));
        assert_ne!(with_l2, without_l2);

        let mut swapped = digest.clone();
        swapped.l2_tx_hashes = vec![B256::with_last_byte(3)];
        // v1+ ignores L2 tx hashes entirely.
        assert_eq!(without_l2, chunk_hash(CodecVersion::new(1), &[swapped]));
    }

    #[test]
    fn test_full_blob_batch_hash_distinct_inputs() {
        let a = full_blob_batch_hash(7, 1, B256::with_last_byte(1), B256::with_last_byte(2));
        let b = full_blob_batch_hash(7, 2, B256::with_last_byte(1), B256::with_last_byte(2));
        assert_ne!(a, b);
    }

    #[test]
    fn test_genesis_header_hash_is_stable() {
        assert_eq!(genesis_batch_header().hash(), genesis_batch_header().hash());
        assert_eq!(genesis_batch_header().index, 0);
    }
}
