//! The codec version tag carried by every commit.

/// Selects the batch/blob encoding and DA layout of a committed batch.
///
/// Versions are open-ended upwards: every version at or above
/// [`CodecVersion::FULL_BLOB_PAYLOAD`] shares the blob-only layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CodecVersion(u8);

impl CodecVersion {
    /// First version whose L2 transactions live in a blob instead of calldata.
    pub const BLOB_TXS: u8 = 1;
    /// First version whose blob envelope is zlib compressed.
    pub const COMPRESSED: u8 = 2;
    /// First version that moves the whole block payload into the blob and
    /// commits to it through the batch hash alone.
    pub const FULL_BLOB_PAYLOAD: u8 = 7;

    /// Wraps a raw on-chain version byte.
    pub const fn new(version: u8) -> Self {
        Self(version)
    }

    /// The raw version byte.
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Whether L2 transactions are carried in a blob (v1+).
    pub const fn uses_blob(self) -> bool {
        self.0 >= Self::BLOB_TXS
    }

    /// Whether the blob envelope is zlib compressed (v2..=v6).
    pub const fn is_compressed(self) -> bool {
        self.0 >= Self::COMPRESSED && self.0 < Self::FULL_BLOB_PAYLOAD
    }

    /// Whether the blob carries the full block payload and the message queue
    /// hash chain (v7+).
    pub const fn has_full_blob_payload(self) -> bool {
        self.0 >= Self::FULL_BLOB_PAYLOAD
    }

    /// Whether chunks commit to L2 transaction hashes (v0 only; later
    /// versions commit to transactions through the blob hash).
    pub const fn chunk_commits_to_l2_txs(self) -> bool {
        self.0 == 0
    }
}

impl From<u8> for CodecVersion {
    fn from(version: u8) -> Self {
        Self(version)
    }
}

impl core::fmt::Display for CodecVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_capabilities() {
        assert!(!CodecVersion::new(0).uses_blob());
        assert!(CodecVersion::new(0).chunk_commits_to_l2_txs());
        assert!(CodecVersion::new(1).uses_blob());
        assert!(!CodecVersion::new(1).is_compressed());
        assert!(CodecVersion::new(2).is_compressed());
        assert!(CodecVersion::new(6).is_compressed());
        assert!(!CodecVersion::new(7).is_compressed());
        assert!(CodecVersion::new(7).has_full_blob_payload());
        // Open-ended upwards.
        assert!(CodecVersion::new(9).has_full_blob_payload());
    }
}
