//! The calldata chunk format of codec v0–v6.
//!
//! A chunk encodes as `num_blocks(1) | block_context(60) × n | tx_payload`,
//! where `tx_payload` is the concatenated RLP L2 transactions of every block
//! in order. The payload is present for v0 only; v1+ move transactions into
//! the blob and post bare contexts.

use super::{decode_txs, encode_txs};
use crate::errors::CodecError;
use alloy_consensus::TxEnvelope;
use mako_primitives::{
    block::{BlockContext, BLOCK_CONTEXT_SIZE},
    CodecVersion,
};

/// A decoded calldata chunk: block contexts paired with their transactions
/// (empty for blob-backed versions until the blob is merged in).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecodedChunk {
    /// The chunk's block contexts, in L2 order.
    pub contexts: Vec<BlockContext>,
    /// Per-block L2 transactions; empty per block for v1+.
    pub txs_per_block: Vec<Vec<TxEnvelope>>,
}

/// Decodes one chunk's calldata bytes. For v0 the trailing transaction
/// payload is decoded per block; for v1+ the chunk must end after its
/// contexts.
pub fn decode_chunk(version: CodecVersion, buf: &[u8]) -> Result<DecodedChunk, CodecError> {
    let Some((&num_blocks, rest)) = buf.split_first() else {
        return Err(CodecError::Truncated("chunk"));
    };
    let num_blocks = num_blocks as usize;
    let contexts_len = num_blocks * BLOCK_CONTEXT_SIZE;
    if rest.len() < contexts_len {
        return Err(CodecError::Truncated("chunk block contexts"));
    }

    let mut contexts = Vec::with_capacity(num_blocks);
    for i in 0..num_blocks {
        let ctx = BlockContext::decode(&rest[i * BLOCK_CONTEXT_SIZE..(i + 1) * BLOCK_CONTEXT_SIZE])?;
        if version.chunk_commits_to_l2_txs() && !ctx.base_fee.is_zero() {
            return Err(CodecError::NonZeroReservedBaseFee(ctx.number));
        }
        contexts.push(ctx);
    }

    let mut tail = &rest[contexts_len..];
    let txs_per_block = if version.uses_blob() {
        if !tail.is_empty() {
            return Err(CodecError::TrailingBytes {
                structure: "chunk contexts",
                remaining: tail.len(),
            });
        }
        vec![Vec::new(); num_blocks]
    } else {
        let mut per_block = Vec::with_capacity(num_blocks);
        for ctx in &contexts {
            per_block.push(decode_txs(&mut tail, ctx.num_l2_transactions() as usize)?);
        }
        if !tail.is_empty() {
            return Err(CodecError::TrailingBytes { structure: "chunk", remaining: tail.len() });
        }
        per_block
    };

    Ok(DecodedChunk { contexts, txs_per_block })
}

/// Encodes one chunk. Transactions are written for v0 only; encoding a v0
/// context with a non-zero reserved base fee is rejected.
pub fn encode_chunk(
    version: CodecVersion,
    contexts: &[BlockContext],
    txs_per_block: &[Vec<TxEnvelope>],
) -> Result<Vec<u8>, CodecError> {
    let mut out = vec![contexts.len() as u8];
    for ctx in contexts {
        if version.chunk_commits_to_l2_txs() && !ctx.base_fee.is_zero() {
            return Err(CodecError::NonZeroReservedBaseFee(ctx.number));
        }
        out.extend_from_slice(&ctx.encode());
    }
    if !version.uses_blob() {
        for txs in txs_per_block {
            out.extend_from_slice(&encode_txs(txs));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_l2_tx;
    use alloy_primitives::U256;

    fn context(number: u64, num_txs: u16) -> BlockContext {
        BlockContext {
            number,
            timestamp: 1_000 + number,
            base_fee: U256::ZERO,
            gas_limit: 10_000_000,
            num_transactions: num_txs,
            num_l1_messages: 0,
        }
    }

    #[test]
    fn test_chunk_roundtrip_with_txs() {
        let contexts = vec![context(1, 2), context(2, 1)];
        let txs = vec![vec![test_l2_tx(0), test_l2_tx(1)], vec![test_l2_tx(2)]];
        let encoded = encode_chunk(CodecVersion::new(0), &contexts, &txs).unwrap();
        let decoded = decode_chunk(CodecVersion::new(0), &encoded).unwrap();
        assert_eq!(decoded.contexts, contexts);
        assert_eq!(decoded.txs_per_block, txs);
    }

    #[test]
    fn test_chunk_contexts_only_for_blob_versions() {
        let contexts = vec![context(5, 3)];
        let encoded = encode_chunk(CodecVersion::new(4), &contexts, &[]).unwrap();
        let decoded = decode_chunk(CodecVersion::new(4), &encoded).unwrap();
        assert_eq!(decoded.contexts, contexts);
        assert_eq!(decoded.txs_per_block, vec![Vec::new()]);
    }

    #[test]
    fn test_reserved_base_fee_enforced() {
        let mut ctx = context(1, 0);
        ctx.base_fee = U256::from(100u64);
        assert!(matches!(
            encode_chunk(CodecVersion::new(0), &[ctx], &[vec![]]),
            Err(CodecError::NonZeroReservedBaseFee(1))
        ));
        // The same context is accepted by blob-era chunks.
        assert!(encode_chunk(CodecVersion::new(2), &[ctx], &[]).is_ok());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let contexts = vec![context(1, 0)];
        let mut encoded = encode_chunk(CodecVersion::new(1), &contexts, &[]).unwrap();
        encoded.push(0xde);
        assert!(matches!(
            decode_chunk(CodecVersion::new(1), &encoded),
            Err(CodecError::TrailingBytes { structure: "chunk contexts", remaining: 1 })
        ));
    }

    #[test]
    fn test_truncated_contexts_rejected() {
        let contexts = vec![context(1, 0)];
        let encoded = encode_chunk(CodecVersion::new(1), &contexts, &[]).unwrap();
        assert!(matches!(
            decode_chunk(CodecVersion::new(1), &encoded[..30]),
            Err(CodecError::Truncated("chunk block contexts"))
        ));
    }
}
