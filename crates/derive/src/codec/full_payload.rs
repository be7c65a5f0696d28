//! The blob envelope of codec v7+: the full block payload plus the message
//! queue hash chain.
//!
//! Layout: `prev_l1_queue_hash(32) | post_l1_queue_hash(32) |
//! initial_l1_queue_index(8) | initial_block_number(8) | num_blocks(2) |
//! block_context_v7(52) × n | tx_payload`, with block numbers consecutive
//! from `initial_block_number` and `tx_payload` the concatenated RLP L2
//! transactions in block order.

use super::{decode_txs, encode_txs};
use crate::errors::CodecError;
use alloy_consensus::TxEnvelope;
use alloy_primitives::B256;
use mako_primitives::block::{BlockContext, BLOCK_CONTEXT_V7_SIZE};

const PREFIX_SIZE: usize = 32 + 32 + 8 + 8 + 2;

/// The decoded v7+ blob payload.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FullPayload {
    /// The message-queue hash before this batch.
    pub prev_l1_queue_hash: B256,
    /// The declared message-queue hash after this batch.
    pub post_l1_queue_hash: B256,
    /// The queue index of the first message this batch pops.
    pub initial_l1_queue_index: u64,
    /// The block contexts, with consecutive numbers.
    pub contexts: Vec<BlockContext>,
    /// Per-block L2 transactions.
    pub txs_per_block: Vec<Vec<TxEnvelope>>,
}

/// Decodes a v7+ blob envelope.
pub fn decode_full_payload(envelope: &[u8]) -> Result<FullPayload, CodecError> {
    if envelope.len() < PREFIX_SIZE {
        return Err(CodecError::Truncated("blob payload prefix"));
    }
    let prev_l1_queue_hash = B256::from_slice(&envelope[0..32]);
    let post_l1_queue_hash = B256::from_slice(&envelope[32..64]);
    let initial_l1_queue_index = u64::from_be_bytes(envelope[64..72].try_into().unwrap());
    let initial_block_number = u64::from_be_bytes(envelope[72..80].try_into().unwrap());
    let num_blocks = u16::from_be_bytes(envelope[80..82].try_into().unwrap()) as usize;

    let contexts_len = num_blocks * BLOCK_CONTEXT_V7_SIZE;
    if envelope.len() < PREFIX_SIZE + contexts_len {
        return Err(CodecError::Truncated("blob payload block contexts"));
    }
    let mut contexts = Vec::with_capacity(num_blocks);
    for i in 0..num_blocks {
        let at = PREFIX_SIZE + i * BLOCK_CONTEXT_V7_SIZE;
        contexts.push(BlockContext::decode_v7(
            initial_block_number + i as u64,
            &envelope[at..at + BLOCK_CONTEXT_V7_SIZE],
        )?);
    }

    let mut tail = &envelope[PREFIX_SIZE + contexts_len..];
    let mut txs_per_block = Vec::with_capacity(num_blocks);
    for ctx in &contexts {
        txs_per_block.push(decode_txs(&mut tail, ctx.num_l2_transactions() as usize)?);
    }
    if !tail.is_empty() {
        return Err(CodecError::TrailingBytes {
            structure: "blob payload",
            remaining: tail.len(),
        });
    }

    Ok(FullPayload {
        prev_l1_queue_hash,
        post_l1_queue_hash,
        initial_l1_queue_index,
        contexts,
        txs_per_block,
    })
}

/// Encodes a v7+ blob envelope. Contexts must carry consecutive numbers.
pub fn encode_full_payload(payload: &FullPayload) -> Vec<u8> {
    let initial_block_number = payload.contexts.first().map(|c| c.number).unwrap_or_default();
    let mut out = Vec::with_capacity(
        PREFIX_SIZE + payload.contexts.len() * BLOCK_CONTEXT_V7_SIZE,
    );
    out.extend_from_slice(payload.prev_l1_queue_hash.as_slice());
    out.extend_from_slice(payload.post_l1_queue_hash.as_slice());
    out.extend_from_slice(&payload.initial_l1_queue_index.to_be_bytes());
    out.extend_from_slice(&initial_block_number.to_be_bytes());
    out.extend_from_slice(&(payload.contexts.len() as u16).to_be_bytes());
    for ctx in &payload.contexts {
        out.extend_from_slice(&ctx.encode_v7());
    }
    for txs in &payload.txs_per_block {
        out.extend_from_slice(&encode_txs(txs));
    }
    out
}
