//! Wire codecs for committed batch payloads: calldata chunks and blob
//! envelopes across every codec version.

mod chunk;
mod envelope;
mod full_payload;

pub use chunk::{decode_chunk, encode_chunk, DecodedChunk};
pub use envelope::{decode_tx_envelope, encode_tx_envelope};
pub use full_payload::{decode_full_payload, encode_full_payload, FullPayload};

use crate::errors::CodecError;
use alloy_consensus::TxEnvelope;
use alloy_rlp::Decodable;

/// Decodes `count` consecutive RLP transactions off the front of `buf`.
pub(crate) fn decode_txs(buf: &mut &[u8], count: usize) -> Result<Vec<TxEnvelope>, CodecError> {
    let mut txs = Vec::with_capacity(count);
    for _ in 0..count {
        if buf.is_empty() {
            return Err(CodecError::Truncated("transaction stream"));
        }
        let tx = TxEnvelope::decode(buf).map_err(CodecError::Rlp)?;
        txs.push(tx);
    }
    Ok(txs)
}

/// Encodes transactions into one concatenated RLP stream.
pub(crate) fn encode_txs(txs: &[TxEnvelope]) -> Vec<u8> {
    let mut out = Vec::new();
    for tx in txs {
        alloy_rlp::Encodable::encode(tx, &mut out);
    }
    out
}
