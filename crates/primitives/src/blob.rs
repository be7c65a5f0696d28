//! EIP-4844 blob payload packing and versioned-hash computation.

use alloy_primitives::B256;
use sha2::{Digest, Sha256};

pub use alloy_eips::eip4844::{Blob, BYTES_PER_BLOB, FIELD_ELEMENTS_PER_BLOB};

/// The versioned hash version byte for KZG commitments.
pub const VERSIONED_HASH_VERSION_KZG: u8 = 0x01;

/// Usable payload bytes per field element; the first byte of every 32-byte
/// field element is kept zero so the element stays canonical.
pub const BYTES_PER_FIELD_ELEMENT_PAYLOAD: usize = 31;

/// Maximum payload a blob can carry, the 4-byte length prefix included.
pub const BLOB_PAYLOAD_SIZE: usize =
    BYTES_PER_FIELD_ELEMENT_PAYLOAD * FIELD_ELEMENTS_PER_BLOB as usize;

/// Maximum envelope bytes a blob can carry after the length prefix.
pub const BLOB_MAX_ENVELOPE_SIZE: usize = BLOB_PAYLOAD_SIZE - 4;

/// Errors produced while packing or unpacking blob payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlobError {
    /// The payload does not fit in one blob.
    #[error("payload of {0} bytes exceeds blob capacity")]
    PayloadTooLarge(usize),
    /// A field element has a non-zero high byte.
    #[error("non-canonical field element at index {0}")]
    NonCanonicalFieldElement(usize),
    /// The declared envelope length overruns the blob.
    #[error("declared envelope length {0} exceeds blob capacity")]
    InvalidEnvelopeLength(usize),
    /// Bytes beyond the declared envelope are not zero.
    #[error("trailing garbage after envelope at payload offset {0}")]
    TrailingGarbage(usize),
    /// The KZG library rejected the blob.
    #[error("kzg error: {0}")]
    Kzg(String),
}

/// Computes the versioned hash of a 48-byte KZG commitment:
/// `VERSIONED_HASH_VERSION_KZG || sha256(commitment)[1..]`.
pub fn commitment_to_versioned_hash(commitment: &[u8; 48]) -> B256 {
    let mut hash: [u8; 32] = Sha256::digest(commitment).into();
    hash[0] = VERSIONED_HASH_VERSION_KZG;
    B256::from(hash)
}

/// Computes a blob's KZG commitment and derives its versioned hash.
pub fn blob_to_versioned_hash(blob: &Blob) -> Result<B256, BlobError> {
    let settings = alloy_eips::eip4844::env_settings::EnvKzgSettings::default();
    let blob = c_kzg::Blob::from_bytes(blob.as_slice()).map_err(|e| BlobError::Kzg(e.to_string()))?;
    let commitment = c_kzg::KzgCommitment::blob_to_kzg_commitment(&blob, settings.get())
        .map_err(|e| BlobError::Kzg(e.to_string()))?;
    Ok(commitment_to_versioned_hash(&commitment.to_bytes().into_inner()))
}

/// Packs an envelope into a blob: a 4-byte big-endian length prefix followed
/// by the envelope bytes, spread over the low 31 bytes of each field element.
pub fn encode_envelope(envelope: &[u8]) -> Result<Box<Blob>, BlobError> {
    if envelope.len() > BLOB_MAX_ENVELOPE_SIZE {
        return Err(BlobError::PayloadTooLarge(envelope.len()));
    }
    let mut payload = vec![0u8; BLOB_PAYLOAD_SIZE];
    payload[..4].copy_from_slice(&(envelope.len() as u32).to_be_bytes());
    payload[4..4 + envelope.len()].copy_from_slice(envelope);

    let mut blob = Box::new(Blob::ZERO);
    for (element, chunk) in payload.chunks(BYTES_PER_FIELD_ELEMENT_PAYLOAD).enumerate() {
        blob[element * 32 + 1..element * 32 + 1 + chunk.len()].copy_from_slice(chunk);
    }
    Ok(blob)
}

/// Unpacks a blob into its envelope, validating canonical field elements,
/// the length prefix, and the all-zero tail.
pub fn decode_envelope(blob: &Blob) -> Result<Vec<u8>, BlobError> {
    let mut payload = vec![0u8; BLOB_PAYLOAD_SIZE];
    for element in 0..FIELD_ELEMENTS_PER_BLOB as usize {
        let start = element * 32;
        if blob[start] != 0 {
            return Err(BlobError::NonCanonicalFieldElement(element));
        }
        payload[element * BYTES_PER_FIELD_ELEMENT_PAYLOAD
            ..(element + 1) * BYTES_PER_FIELD_ELEMENT_PAYLOAD]
            .copy_from_slice(&blob[start + 1..start + 32]);
    }

    let length = u32::from_be_bytes(payload[..4].try_into().unwrap()) as usize;
    if length > BLOB_MAX_ENVELOPE_SIZE {
        return Err(BlobError::InvalidEnvelopeLength(length));
    }
    if let Some(garbage) = payload[4 + length..].iter().position(|b| *b != 0) {
        return Err(BlobError::TrailingGarbage(4 + length + garbage));
    }
    payload.truncate(4 + length);
    payload.drain(..4);
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_roundtrip() {
        let envelope: Vec<u8> = (0u32..1000).map(|i| (i % 251) as u8).collect();
        let blob = encode_envelope(&envelope).unwrap();
        assert_eq!(decode_envelope(&blob).unwrap(), envelope);
    }

    #[test]
    fn test_envelope_empty() {
        let blob = encode_envelope(&[]).unwrap();
        assert!(decode_envelope(&blob).unwrap().is_empty());
    }

    #[test]
    fn test_envelope_too_large() {
        let envelope = vec![0u8; BLOB_MAX_ENVELOPE_SIZE + 1];
        assert!(matches!(encode_envelope(&envelope), Err(BlobError::PayloadTooLarge(_))));
    }

    #[test]
    fn test_decode_rejects_non_canonical() {
        let mut blob = *encode_envelope(b"hello").unwrap();
        blob[64] = 0xff;
        assert!(matches!(decode_envelope(&blob), Err(BlobError::NonCanonicalFieldElement(2))));
    }

    #[test]
    fn test_decode_rejects_trailing_garbage() {
        let mut blob = *encode_envelope(b"hello").unwrap();
        // Flip a payload byte beyond the declared length.
        blob[32 + 1 + 20] = 1;
        assert!(matches!(decode_envelope(&blob), Err(BlobError::TrailingGarbage(_))));
    }

    #[test]
    fn test_commitment_versioned_hash_prefix() {
        let hash = commitment_to_versioned_hash(&[0u8; 48]);
        assert_eq!(hash[0], VERSIONED_HASH_VERSION_KZG);
    }
}
