//! The blob envelope of codec v1–v6: per-chunk transaction payloads framed
//! as `num_chunks(2) | payload_len(4) × n | payload × n`, zlib-compressed as
//! a whole for v2+.

use crate::errors::CodecError;
use mako_primitives::{blob::BLOB_MAX_ENVELOPE_SIZE, CodecVersion};
use miniz_oxide::{deflate::compress_to_vec_zlib, inflate::decompress_to_vec_zlib_with_limit};

/// Upper bound for a decompressed envelope; a compressed envelope that
/// inflates past this is malformed.
const MAX_DECOMPRESSED_SIZE: usize = 8 * BLOB_MAX_ENVELOPE_SIZE;

/// Decodes a v1–v6 blob envelope into per-chunk transaction payloads.
pub fn decode_tx_envelope(
    version: CodecVersion,
    envelope: &[u8],
) -> Result<Vec<Vec<u8>>, CodecError> {
    let inflated;
    let envelope = if version.is_compressed() {
        inflated = decompress_to_vec_zlib_with_limit(envelope, MAX_DECOMPRESSED_SIZE)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        inflated.as_slice()
    } else {
        envelope
    };

    if envelope.len() < 2 {
        return Err(CodecError::Truncated("blob envelope"));
    }
    let num_chunks = u16::from_be_bytes(envelope[..2].try_into().unwrap()) as usize;
    let header_len = 2 + num_chunks * 4;
    if envelope.len() < header_len {
        return Err(CodecError::Truncated("blob envelope chunk lengths"));
    }

    let mut payloads = Vec::with_capacity(num_chunks);
    let mut offset = header_len;
    for chunk in 0..num_chunks {
        let at = 2 + chunk * 4;
        let len = u32::from_be_bytes(envelope[at..at + 4].try_into().unwrap()) as usize;
        if envelope.len() < offset + len {
            return Err(CodecError::Truncated("blob envelope chunk payload"));
        }
        payloads.push(envelope[offset..offset + len].to_vec());
        offset += len;
    }
    if offset != envelope.len() {
        return Err(CodecError::TrailingBytes {
            structure: "blob envelope",
            remaining: envelope.len() - offset,
        });
    }
    Ok(payloads)
}

/// Encodes per-chunk transaction payloads into a v1–v6 blob envelope.
pub fn encode_tx_envelope(version: CodecVersion, chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + chunks.iter().map(|c| 4 + c.len()).sum::<usize>());
    out.extend_from_slice(&(chunks.len() as u16).to_be_bytes());
    for chunk in chunks {
        out.extend_from_slice(&(chunk.len() as u32).to_be_bytes());
    }
    for chunk in chunks {
        out.extend_from_slice(chunk);
    }
    if version.is_compressed() {
        out = compress_to_vec_zlib(&out, 6);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_roundtrip_raw() {
        let chunks = vec![vec![1u8, 2, 3], vec![], vec![4u8; 100]];
        let encoded = encode_tx_envelope(CodecVersion::new(1), &chunks);
        assert_eq!(decode_tx_envelope(CodecVersion::new(1), &encoded).unwrap(), chunks);
    }

    #[test]
    fn test_envelope_roundtrip_compressed() {
        let chunks = vec![vec![7u8; 4096], vec![9u8; 128]];
        let encoded = encode_tx_envelope(CodecVersion::new(3), &chunks);
        // Compressible payloads shrink on the wire.
        assert!(encoded.len() < 4096);
        assert_eq!(decode_tx_envelope(CodecVersion::new(3), &encoded).unwrap(), chunks);
    }

    #[test]
    fn test_envelope_bad_compression_rejected() {
        assert!(matches!(
            decode_tx_envelope(CodecVersion::new(2), &[0xff, 0xfe, 0xfd]),
            Err(CodecError::Decompression(_))
        ));
    }

    #[test]
    fn test_envelope_trailing_bytes_rejected() {
        let mut encoded = encode_tx_envelope(CodecVersion::new(1), &[vec![1u8]]);
        encoded.push(0);
        assert!(matches!(
            decode_tx_envelope(CodecVersion::new(1), &encoded),
            Err(CodecError::TrailingBytes { structure: "blob envelope", remaining: 1 })
        ));
    }

    #[test]
    fn test_envelope_truncated_rejected() {
        let encoded = encode_tx_envelope(CodecVersion::new(1), &[vec![1u8, 2, 3]]);
        assert!(matches!(
            decode_tx_envelope(CodecVersion::new(1), &encoded[..encoded.len() - 1]),
            Err(CodecError::Truncated("blob envelope chunk payload"))
        ));
    }
}
