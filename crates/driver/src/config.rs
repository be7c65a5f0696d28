//! Node configuration recognized by the pipeline and verifier.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// A known historical batch-hash mismatch mapped to the L1 height the
/// verifier rewinds to instead of halting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSyncHeight {
    /// The batch hash the mismatch reports.
    pub batch_hash: B256,
    /// The L1 height to rewind the verifier cursor to.
    pub l1_height: u64,
}

/// Errors produced by [`Config::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No blob backend was configured.
    #[error("at least one blob API endpoint is required")]
    NoBlobEndpoint,
    /// Recovery mode requires both anchors.
    #[error("recovery mode requires non-zero InitialL1Block and InitialBatch")]
    IncompleteRecoveryAnchor,
}

/// The recognized configuration options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// BlobScan API endpoint.
    #[serde(rename = "BlobScanAPIEndpoint")]
    pub blob_scan_api_endpoint: Option<String>,
    /// BlockNative API endpoint.
    #[serde(rename = "BlockNativeAPIEndpoint")]
    pub block_native_api_endpoint: Option<String>,
    /// Beacon node API endpoint.
    #[serde(rename = "BeaconNodeAPIEndpoint")]
    pub beacon_node_api_endpoint: Option<String>,
    /// S3-compatible blob archive endpoint.
    #[serde(rename = "AwsS3BlobAPIEndpoint")]
    pub aws_s3_blob_api_endpoint: Option<String>,
    /// Start from an explicit L1/batch anchor instead of persisted state.
    #[serde(rename = "RecoveryMode")]
    pub recovery_mode: bool,
    /// The L1 block derivation restarts from in recovery mode.
    #[serde(rename = "InitialL1Block")]
    pub initial_l1_block: u64,
    /// The batch index derivation restarts from in recovery mode.
    #[serde(rename = "InitialBatch")]
    pub initial_batch: u64,
    /// Whether derived blocks are signed before insertion.
    #[serde(rename = "SignBlocks")]
    pub sign_blocks: bool,
    /// Stop after deriving this L2 height; zero means unlimited.
    #[serde(rename = "L2EndBlock")]
    pub l2_end_block: u64,
    /// Produce blocks locally instead of deriving them; disables the
    /// pipeline entirely.
    #[serde(rename = "ProduceBlocks")]
    pub produce_blocks: bool,
    /// Known mismatches the verifier resolves by rewinding.
    #[serde(rename = "ResetSyncHeights")]
    pub reset_sync_heights: Vec<ResetSyncHeight>,
}

impl Config {
    /// Whether the derivation pipeline runs at all.
    pub const fn pipeline_enabled(&self) -> bool {
        !self.produce_blocks
    }

    /// The checkpoint a recovery run starts from, or `None` outside
    /// recovery mode: derivation resumes at `initial_batch`, scanning from
    /// `initial_l1_block`. The cumulative message counter is not derivable
    /// from the anchor alone; callers read it from the rollup contract.
    pub fn recovery_checkpoint(
        &self,
        total_l1_messages_popped: u64,
    ) -> Option<mako_primitives::meta::DaProcessedBatchMeta> {
        self.recovery_mode.then(|| mako_primitives::meta::DaProcessedBatchMeta {
            batch_index: self.initial_batch.saturating_sub(1),
            l1_block_number: self.initial_l1_block,
            total_l1_messages_popped,
        })
    }

    /// Checks option consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blob_scan_api_endpoint.is_none()
            && self.block_native_api_endpoint.is_none()
            && self.beacon_node_api_endpoint.is_none()
            && self.aws_s3_blob_api_endpoint.is_none()
        {
            return Err(ConfigError::NoBlobEndpoint);
        }
        if self.recovery_mode && (self.initial_l1_block == 0 || self.initial_batch == 0) {
            return Err(ConfigError::IncompleteRecoveryAnchor);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_a_blob_endpoint() {
        let config = Config::default();
        assert_eq!(config.validate(), Err(ConfigError::NoBlobEndpoint));

        let config =
            Config { beacon_node_api_endpoint: Some("http://beacon".into()), ..Default::default() };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_recovery_mode_needs_both_anchors() {
        let config = Config {
            beacon_node_api_endpoint: Some("http://beacon".into()),
            recovery_mode: true,
            initial_l1_block: 100,
            initial_batch: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::IncompleteRecoveryAnchor));

        let config = Config { initial_batch: 5, ..config };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_recovery_checkpoint_anchors_one_before_initial_batch() {
        let config = Config {
            recovery_mode: true,
            initial_l1_block: 700,
            initial_batch: 41,
            ..Default::default()
        };
        let checkpoint = config.recovery_checkpoint(9).unwrap();
        // Batch 41 is the next to be emitted.
        assert_eq!(checkpoint.batch_index, 40);
        assert_eq!(checkpoint.l1_block_number, 700);
        assert_eq!(checkpoint.total_l1_messages_popped, 9);
        assert!(Config::default().recovery_checkpoint(0).is_none());
    }

    #[test]
    fn test_recognized_option_names() {
        let config: Config = serde_json::from_str(
            r#"{
                "BlobScanAPIEndpoint": "https://blobs.example",
                "RecoveryMode": true,
                "InitialL1Block": 7,
                "InitialBatch": 3,
                "L2EndBlock": 900,
                "ResetSyncHeights": [
                    {"batch_hash": "0x0101010101010101010101010101010101010101010101010101010101010101", "l1_height": 42}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.blob_scan_api_endpoint.as_deref(), Some("https://blobs.example"));
        assert!(config.recovery_mode);
        assert_eq!(config.l2_end_block, 900);
        assert_eq!(config.reset_sync_heights[0].l1_height, 42);
        assert!(config.pipeline_enabled());
    }
}
